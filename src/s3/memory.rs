//! In-memory object store
//!
//! Mirrors the listing behaviour of S3: keys come back in lexicographic
//! order, at most `page_size` entries per page, with continuation tokens and
//! delimiter grouping. Every primitive call is counted, and faults can be
//! scripted per primitive so the failure paths of composite operations can be
//! exercised without a network.

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::Poll;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, ReadBuf};

use crate::s3::store::{ObjectReader, ObjectStore, PutBody};
use crate::s3::types::{ListObjectsResult, ListRequest, ObjectMetadata, ObjectSummary};

/// Page size used when neither the store nor the request sets one
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Store primitive, used to count calls and script faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    List,
    Head,
    Get,
    Put,
    Delete,
    Copy,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
enum Fault {
    /// Fail the n-th call (1-based, counted from store creation)
    Nth(StoreCall, usize),
    /// Fail every call of this kind on this key
    Key(StoreCall, String),
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    calls: HashMap<StoreCall, usize>,
    faults: Vec<Fault>,
    /// Keys whose body stream breaks after this many bytes
    interrupted_reads: HashMap<String, usize>,
}

/// Body stream that yields `remaining` bytes and then fails
struct InterruptedReader {
    data: Bytes,
    remaining: usize,
}

impl AsyncRead for InterruptedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Injected read failure",
            )));
        }

        let n = this.remaining.min(this.data.len()).min(buf.remaining());
        buf.put_slice(&this.data[..n]);
        this.data = this.data.slice(n..);
        this.remaining -= n;
        Poll::Ready(Ok(()))
    }
}

/// Continuation token position: after an object key, or after every key of a
/// common prefix
enum Resume {
    AfterKey(String),
    AfterPrefix(String),
}

impl Resume {
    fn decode(token: &str) -> Result<Self> {
        if let Some(key) = token.strip_prefix("k:") {
            Ok(Resume::AfterKey(key.to_string()))
        } else if let Some(prefix) = token.strip_prefix("p:") {
            Ok(Resume::AfterPrefix(prefix.to_string()))
        } else {
            bail!("Invalid continuation token: {}", token)
        }
    }

    fn skips(&self, key: &str) -> bool {
        match self {
            Resume::AfterKey(last) => key <= last.as_str(),
            Resume::AfterPrefix(prefix) => key <= prefix.as_str() || key.starts_with(prefix.as_str()),
        }
    }
}

/// Thread-safe in-memory [`ObjectStore`]
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Store returning at most `page_size` entries per list call
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // State stays consistent across a panic in another holder
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an empty bucket (no-op if it exists)
    pub fn create_bucket(&self, bucket: &str) {
        self.state().buckets.entry(bucket.to_string()).or_default();
    }

    /// Seed an object without counting a call
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    data: data.into(),
                    last_modified: Utc::now(),
                },
            );
    }

    /// All keys of a bucket in lexicographic order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Content of one object, without counting a call
    pub fn contents(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|obj| obj.data.clone())
    }

    /// Number of calls made to one primitive
    pub fn calls(&self, call: StoreCall) -> usize {
        self.state().calls.get(&call).copied().unwrap_or(0)
    }

    /// Number of calls made to any primitive
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// Make the `nth` call (1-based, counted over the store's lifetime) of a
    /// primitive fail
    pub fn fail_nth(&self, call: StoreCall, nth: usize) {
        self.state().faults.push(Fault::Nth(call, nth));
    }

    /// Make every call of a primitive touching `key` fail. For copies the key
    /// is matched against both source and target.
    pub fn fail_key(&self, call: StoreCall, key: &str) {
        self.state().faults.push(Fault::Key(call, key.to_string()));
    }

    /// Make the body stream of `key` fail after `bytes` bytes. The get call
    /// itself succeeds.
    pub fn interrupt_read(&self, key: &str, bytes: usize) {
        self.state().interrupted_reads.insert(key.to_string(), bytes);
    }

    /// Count the call and fail it if a fault matches
    fn record(&self, state: &mut State, call: StoreCall, keys: &[&str]) -> Result<()> {
        let count = state.calls.entry(call).or_insert(0);
        *count += 1;
        let count = *count;

        let faulted = state.faults.iter().any(|fault| match fault {
            Fault::Nth(c, n) => *c == call && *n == count,
            Fault::Key(c, k) => *c == call && keys.contains(&k.as_str()),
        });

        if faulted {
            tracing::debug!("Injected {:?} failure on call {} for {:?}", call, count, keys);
            return Err(anyhow!("Injected {:?} failure for {:?}", call, keys));
        }

        Ok(())
    }

    fn list_page(
        objects: &BTreeMap<String, StoredObject>,
        request: &ListRequest,
        page_size: usize,
    ) -> Result<ListObjectsResult> {
        let max_keys = request
            .max_keys
            .filter(|m| *m > 0)
            .map(|m| (m as usize).min(page_size))
            .unwrap_or(page_size);
        let resume = request
            .continuation_token
            .as_deref()
            .map(Resume::decode)
            .transpose()?;

        let mut result = ListObjectsResult::default();
        let mut emitted = 0;
        let mut last: Option<Resume> = None;

        for (key, obj) in objects.range(request.prefix.clone()..) {
            if !key.starts_with(&request.prefix) {
                break;
            }
            if resume.as_ref().is_some_and(|r| r.skips(key)) {
                continue;
            }
            if let Some(Resume::AfterPrefix(prefix)) = &last {
                if key.starts_with(prefix.as_str()) {
                    continue;
                }
            }

            if emitted == max_keys {
                result.is_truncated = true;
                break;
            }

            let rest = &key[request.prefix.len()..];
            let grouped = request
                .delimiter
                .as_deref()
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|pos| pos + d.len()));

            match grouped {
                Some(end) => {
                    let common = format!("{}{}", request.prefix, &rest[..end]);
                    result.common_prefixes.push(common.clone());
                    last = Some(Resume::AfterPrefix(common));
                }
                None => {
                    result.objects.push(ObjectSummary {
                        key: key.clone(),
                        size: obj.data.len() as u64,
                        last_modified: Some(obj.last_modified),
                        etag: Some(etag(&obj.data)),
                        storage_class: Some("STANDARD".to_string()),
                    });
                    last = Some(Resume::AfterKey(key.clone()));
                }
            }
            emitted += 1;
        }

        if result.is_truncated {
            result.next_token = last.map(|r| match r {
                Resume::AfterKey(key) => format!("k:{}", key),
                Resume::AfterPrefix(prefix) => format!("p:{}", prefix),
            });
        }

        Ok(result)
    }
}

/// Cheap content fingerprint standing in for an MD5 etag
fn etag(data: &[u8]) -> String {
    let hash = data
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
            (h ^ *b as u64).wrapping_mul(0x0100_0000_01b3)
        });
    format!("\"{:016x}\"", hash)
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, bucket: &str, request: ListRequest) -> Result<ListObjectsResult> {
        let mut state = self.state();
        self.record(&mut state, StoreCall::List, &[request.prefix.as_str()])?;
        let objects = state
            .buckets
            .get(bucket)
            .with_context(|| format!("NoSuchBucket: {}", bucket))?;
        Self::list_page(objects, &request, self.page_size)
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        let mut state = self.state();
        self.record(&mut state, StoreCall::Head, &[key])?;
        let objects = state
            .buckets
            .get(bucket)
            .with_context(|| format!("NoSuchBucket: {}", bucket))?;
        Ok(objects.get(key).map(|obj| ObjectMetadata {
            key: key.to_string(),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
            etag: Some(etag(&obj.data)),
            content_type: Some("application/octet-stream".to_string()),
            storage_class: Some("STANDARD".to_string()),
        }))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let mut state = self.state();
        self.record(&mut state, StoreCall::Get, &[key])?;
        let data = state
            .buckets
            .get(bucket)
            .with_context(|| format!("NoSuchBucket: {}", bucket))?
            .get(key)
            .map(|obj| obj.data.clone())
            .with_context(|| format!("NoSuchKey: {}", key))?;

        match state.interrupted_reads.get(key) {
            Some(&remaining) => Ok(Box::pin(InterruptedReader { data, remaining })),
            None => Ok(Box::pin(std::io::Cursor::new(data))),
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: PutBody) -> Result<()> {
        let data = match body {
            PutBody::Empty => Bytes::new(),
            PutBody::Bytes(data) => data,
            PutBody::File(path) => tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {:?}", path))?
                .into(),
        };

        let mut state = self.state();
        self.record(&mut state, StoreCall::Put, &[key])?;
        state
            .buckets
            .get_mut(bucket)
            .with_context(|| format!("NoSuchBucket: {}", bucket))?
            .insert(
                key.to_string(),
                StoredObject {
                    data,
                    last_modified: Utc::now(),
                },
            );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state();
        self.record(&mut state, StoreCall::Delete, &[key])?;
        state
            .buckets
            .get_mut(bucket)
            .with_context(|| format!("NoSuchBucket: {}", bucket))?
            .remove(key);
        Ok(())
    }

    async fn copy(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        let mut state = self.state();
        self.record(&mut state, StoreCall::Copy, &[source_key, target_key])?;
        let objects = state
            .buckets
            .get_mut(bucket)
            .with_context(|| format!("NoSuchBucket: {}", bucket))?;
        let data = objects
            .get(source_key)
            .map(|obj| obj.data.clone())
            .with_context(|| format!("NoSuchKey: {}", source_key))?;
        objects.insert(
            target_key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }
}
