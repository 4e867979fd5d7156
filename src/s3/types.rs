//! Object store data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys;

/// Snapshot of one object as reported by a listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

impl ObjectSummary {
    /// Summary carrying only a key and size
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
            storage_class: None,
        }
    }

    /// Whether the key is a folder marker
    pub fn is_folder(&self) -> bool {
        keys::is_folder(&self.key)
    }

    /// Get the display name (last component of the key)
    pub fn display_name(&self) -> &str {
        if self.is_folder() {
            keys::folder_name(&self.key)
        } else {
            keys::file_name(&self.key)
        }
    }
}

/// Metadata returned by a head request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
}

/// Parameters of one paginated list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// Group keys by this separator into common prefixes
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<i32>,
}

impl ListRequest {
    /// Request for every key under `prefix`
    pub fn recursive(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    /// Request for the immediate children of `prefix`
    pub fn one_level(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            delimiter: Some(keys::DELIMITER.to_string()),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

/// One page of a list call
#[derive(Debug, Clone, Default)]
pub struct ListObjectsResult {
    /// Objects in this page, in store order
    pub objects: Vec<ObjectSummary>,
    /// Folder prefixes grouped by the delimiter (empty without one)
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
    pub is_truncated: bool,
}

/// S3 URL parsed components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Url {
    pub bucket: String,
    pub key: String,
}

impl S3Url {
    /// Parse an S3 URL (supports s3:// and https:// formats)
    pub fn parse(url: &str) -> Option<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            return Self::from_path(rest);
        }

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return None;
        }

        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let path = parsed.path().trim_start_matches('/');
        let path = urlencoding::decode(path).ok()?;

        // Virtual-hosted style: bucket.s3.region.amazonaws.com
        if host.contains(".s3.") && host.ends_with(".amazonaws.com") {
            let bucket = host.split(".s3.").next()?;
            return Some(S3Url {
                bucket: bucket.to_string(),
                key: path.into_owned(),
            });
        }

        // Path style: s3.region.amazonaws.com/bucket/key
        if host.starts_with("s3.") && host.ends_with(".amazonaws.com") {
            return Self::from_path(&path);
        }

        None
    }

    fn from_path(path: &str) -> Option<Self> {
        let (bucket, key) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return None;
        }
        Some(S3Url {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Convert to s3:// URL format
    pub fn to_s3_url(&self) -> String {
        keys::to_s3_uri(&self.bucket, &self.key)
    }

    /// Folder to browse when navigating to this location: the key itself for
    /// folders, the containing folder for files
    pub fn browse_prefix(&self) -> String {
        if keys::is_folder(&self.key) {
            self.key.clone()
        } else {
            keys::parent_folder_key(&self.key)
        }
    }
}
