//! S3 Folders Library
//!
//! Hierarchical file and folder semantics on top of a flat, key-addressed
//! object store. A key ending in `/` is a folder; everything else is a file.
//!
//! - [`keys`] - classification and key rewriting
//! - [`listing::ObjectLister`] - one-level and recursive paginated listing
//! - [`search::SearchEngine`] - filtered search with an early-exit cap
//! - [`operations::ObjectOperations`] - create, copy, move, rename, delete,
//!   upload and download of files and folders

pub mod error;
pub mod keys;
pub mod listing;
pub mod operations;
pub mod s3;
pub mod search;
pub mod settings;

pub use error::{OpError, OpResult};
pub use listing::{ObjectLister, OneLevelListing, Pager};
pub use operations::{MoveOutcome, MovePhase, MoveResult, ObjectOperations, OperationResult};
pub use search::{SearchEngine, SearchQuery};
pub use settings::Settings;
