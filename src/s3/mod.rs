//! Object store access
//!
//! This module provides the store boundary used by the folder logic:
//! - [`store::ObjectStore`] - list/head/get/put/delete/copy primitives
//! - [`client::S3Client`] - AWS SDK implementation
//! - [`memory::MemoryStore`] - in-memory implementation with call accounting
//! - [`types`] - store data types (ObjectSummary, ListRequest, S3Url)

pub mod client;
pub mod memory;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use client::{S3Client, S3ClientConfig};
pub use memory::{MemoryStore, StoreCall};
pub use store::{ObjectReader, ObjectStore, PutBody};
pub use types::{ListObjectsResult, ListRequest, ObjectMetadata, ObjectSummary, S3Url};
