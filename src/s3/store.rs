//! Object store primitives
//!
//! [`ObjectStore`] is the seam between the folder logic and the network. Each
//! method is one independent, individually atomic round trip; the store
//! offers no multi-key transaction. Retry and backoff policy, if any, belong
//! to implementations of this trait.

use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::s3::types::{ListObjectsResult, ListRequest, ObjectMetadata};

/// Streamed object content returned by [`ObjectStore::get`]
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Body of a put request
#[derive(Debug, Clone)]
pub enum PutBody {
    /// Zero-byte object, used for folder markers
    Empty,
    Bytes(Bytes),
    /// Content streamed from a local file
    File(PathBuf),
}

/// Network-facing primitives of a flat, key-addressed object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// One page of keys under `request.prefix`
    async fn list(&self, bucket: &str, request: ListRequest) -> Result<ListObjectsResult>;

    /// Object metadata, `None` when the key does not exist
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>>;

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectReader>;

    async fn put(&self, bucket: &str, key: &str, body: PutBody) -> Result<()>;

    /// Delete a key. Deleting a missing key succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Store-side copy within one bucket
    async fn copy(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()>;
}
