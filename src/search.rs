//! Filtered recursive search
//!
//! Walks the paginated listing under a prefix and keeps the objects that pass
//! every supplied filter. Enumeration stops as soon as the result cap is
//! reached, even when more pages remain, so a broad search over a large
//! bucket costs no more round trips than needed to fill the cap.

use serde::{Deserialize, Serialize};

use crate::error::OpResult;
use crate::keys;
use crate::listing::ObjectLister;
use crate::s3::ObjectSummary;

/// Search criteria. Absent or empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Only keys under this prefix are enumerated
    pub prefix: String,
    /// Case-insensitive substring of the file-name portion of the key
    pub name_filter: Option<String>,
    /// Case-insensitive exact extension, with or without the leading dot
    pub extension_filter: Option<String>,
    /// Case-insensitive substring of the full key
    pub folder_filter: Option<String>,
    /// Stop after this many matches; zero or less means unbounded
    pub max_results: i64,
}

impl SearchQuery {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    pub fn extension(mut self, filter: impl Into<String>) -> Self {
        self.extension_filter = Some(filter.into());
        self
    }

    pub fn folder(mut self, filter: impl Into<String>) -> Self {
        self.folder_filter = Some(filter.into());
        self
    }

    pub fn max_results(mut self, max_results: i64) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Filters of a [`SearchQuery`], lower-cased once
struct Matcher {
    folder: Option<String>,
    name: Option<String>,
    extension: Option<String>,
}

impl Matcher {
    fn new(query: &SearchQuery) -> Self {
        fn normalize(filter: &Option<String>) -> Option<String> {
            filter
                .as_deref()
                .filter(|f| !f.is_empty())
                .map(str::to_lowercase)
        }

        Self {
            folder: normalize(&query.folder_filter),
            name: normalize(&query.name_filter),
            extension: normalize(&query.extension_filter)
                .map(|ext| ext.trim_start_matches('.').to_string()),
        }
    }

    /// Folder containment, then name, then extension
    fn matches(&self, key: &str) -> bool {
        if let Some(folder) = &self.folder {
            if !key.to_lowercase().contains(folder.as_str()) {
                return false;
            }
        }

        let file_name = keys::file_name(key);

        if let Some(name) = &self.name {
            if !file_name.to_lowercase().contains(name.as_str()) {
                return false;
            }
        }

        if let Some(extension) = &self.extension {
            if keys::file_extension(file_name) != *extension {
                return false;
            }
        }

        true
    }
}

/// Search over the recursive listing of an [`ObjectLister`]
#[derive(Clone)]
pub struct SearchEngine {
    lister: ObjectLister,
}

impl SearchEngine {
    pub fn new(lister: ObjectLister) -> Self {
        Self { lister }
    }

    /// Objects under `query.prefix` passing every filter, in store order
    pub async fn search(&self, bucket: &str, query: &SearchQuery) -> OpResult<Vec<ObjectSummary>> {
        let matcher = Matcher::new(query);
        let cap = usize::try_from(query.max_results).ok().filter(|c| *c > 0);

        let mut pager = self.lister.pages(bucket, &query.prefix);
        let mut results = Vec::new();

        'pages: while let Some(page) = pager.next_page().await? {
            for obj in page {
                if !matcher.matches(&obj.key) {
                    continue;
                }
                results.push(obj);
                if cap.is_some_and(|c| results.len() >= c) {
                    break 'pages;
                }
            }
        }

        tracing::info!(
            "Search under s3://{}/{} found {} objects ({} pages)",
            bucket,
            query.prefix,
            results.len(),
            pager.pages_fetched()
        );

        Ok(results)
    }
}
