//! Prefix enumeration
//!
//! Two listing shapes are offered:
//! - [`ObjectLister::list_one_level`] - a single delimited round trip for
//!   browsing one folder
//! - [`ObjectLister::list_all_under_prefix`] - every key under a prefix,
//!   following continuation tokens, used as the worklist of recursive
//!   copy, move, rename and delete

use std::sync::Arc;

use crate::error::{OpError, OpResult};
use crate::keys;
use crate::s3::{ListRequest, ObjectStore, ObjectSummary};

/// Immediate children of one folder
#[derive(Debug, Clone, Default)]
pub struct OneLevelListing {
    pub prefix: String,
    /// Child folder prefixes, each ending in `/`
    pub folders: Vec<String>,
    /// Child files, plus child folder markers the store reported as objects
    pub files: Vec<ObjectSummary>,
    /// More children exist than one round trip returned
    pub is_truncated: bool,
}

/// Finite, non-restartable sequence of listing pages under one prefix
pub struct Pager {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    page_size: Option<i32>,
    next_token: Option<String>,
    finished: bool,
    pages_fetched: usize,
}

impl Pager {
    /// Fetch the next page. Returns `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> OpResult<Option<Vec<ObjectSummary>>> {
        if self.finished {
            return Ok(None);
        }

        let mut request = ListRequest::recursive(&self.prefix).with_token(self.next_token.take());
        if let Some(page_size) = self.page_size {
            request = request.with_max_keys(page_size);
        }

        let page = match self.store.list(&self.bucket, request).await {
            Ok(page) => page,
            Err(e) => {
                self.finished = true;
                tracing::error!(
                    "Listing s3://{}/{} failed on page {}: {:#}",
                    self.bucket,
                    self.prefix,
                    self.pages_fetched + 1,
                    e
                );
                return Err(e.into());
            }
        };

        self.pages_fetched += 1;
        self.next_token = page.next_token;
        self.finished = self.next_token.is_none();

        tracing::debug!(
            "Listed page {} of s3://{}/{}: {} objects",
            self.pages_fetched,
            self.bucket,
            self.prefix,
            page.objects.len()
        );

        Ok(Some(page.objects))
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

/// Paginated enumeration of keys under a prefix
#[derive(Clone)]
pub struct ObjectLister {
    store: Arc<dyn ObjectStore>,
    page_size: Option<i32>,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            page_size: None,
        }
    }

    /// Ask the store for at most `page_size` keys per call
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = (page_size > 0).then_some(page_size);
        self
    }

    /// Immediate child folders and files of `prefix`, from one round trip
    pub async fn list_one_level(&self, bucket: &str, prefix: &str) -> OpResult<OneLevelListing> {
        let mut request = ListRequest::one_level(prefix);
        if let Some(page_size) = self.page_size {
            request = request.with_max_keys(page_size);
        }

        let page = self.store.list(bucket, request).await?;

        let files: Vec<ObjectSummary> = page
            .objects
            .into_iter()
            .filter(|obj| obj.key != prefix)
            .collect();

        tracing::debug!(
            "Listed s3://{}/{}: {} folders, {} files",
            bucket,
            prefix,
            page.common_prefixes.len(),
            files.len()
        );

        Ok(OneLevelListing {
            prefix: prefix.to_string(),
            folders: page.common_prefixes,
            files,
            is_truncated: page.is_truncated,
        })
    }

    /// Page cursor over every key under `prefix`
    pub fn pages(&self, bucket: &str, prefix: &str) -> Pager {
        Pager {
            store: Arc::clone(&self.store),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            page_size: self.page_size,
            next_token: None,
            finished: false,
            pages_fetched: 0,
        }
    }

    /// Every object under `prefix`, in store order.
    ///
    /// Any page failure aborts the whole listing and nothing is returned, so a
    /// failed listing is never mistaken for a complete worklist.
    pub async fn list_all_under_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> OpResult<Vec<ObjectSummary>> {
        let mut pager = self.pages(bucket, prefix);
        let mut objects = Vec::new();

        while let Some(page) = pager.next_page().await? {
            objects.extend(page);
        }

        tracing::debug!(
            "Enumerated {} objects under s3://{}/{} in {} pages",
            objects.len(),
            bucket,
            prefix,
            pager.pages_fetched()
        );

        Ok(objects)
    }

    /// Keys of every descendant of a folder, the folder marker included
    pub async fn descendant_keys(&self, bucket: &str, folder_key: &str) -> OpResult<Vec<String>> {
        if !folder_key.is_empty() && keys::is_file(folder_key) {
            return Err(OpError::IsFile(folder_key.to_string()));
        }

        Ok(self
            .list_all_under_prefix(bucket, folder_key)
            .await?
            .into_iter()
            .map(|obj| obj.key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::{MemoryStore, StoreCall};

    fn store_with(keys: &[&str], page_size: usize) -> Arc<MemoryStore> {
        let store = MemoryStore::with_page_size(page_size);
        store.create_bucket("b");
        for key in keys {
            store.insert("b", key, Vec::from(key.as_bytes()));
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_list_one_level() {
        let store = store_with(
            &["docs/", "docs/a.txt", "docs/img/logo.png", "docs/sub/", "other.txt"],
            1000,
        );
        let lister = ObjectLister::new(store.clone());

        let listing = lister.list_one_level("b", "docs/").await.unwrap();
        assert_eq!(listing.folders, vec!["docs/img/", "docs/sub/"]);
        let files: Vec<&str> = listing.files.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(files, vec!["docs/a.txt"]);
        assert!(!listing.is_truncated);
        assert_eq!(store.calls(StoreCall::List), 1);
    }

    #[tokio::test]
    async fn test_list_one_level_is_single_round_trip() {
        let store = store_with(&["a.txt", "b.txt", "c.txt"], 2);
        let lister = ObjectLister::new(store.clone());

        let listing = lister.list_one_level("b", "").await.unwrap();
        assert_eq!(listing.files.len(), 2);
        assert!(listing.is_truncated);
        assert_eq!(store.calls(StoreCall::List), 1);
    }

    #[tokio::test]
    async fn test_list_all_follows_tokens() {
        let keys: Vec<String> = (0..25).map(|i| format!("data/file-{:04}.txt", i)).collect();
        let refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let store = store_with(&refs, 10);
        let lister = ObjectLister::new(store.clone());

        let all = lister.list_all_under_prefix("b", "data/").await.unwrap();
        let listed: Vec<String> = all.into_iter().map(|o| o.key).collect();
        assert_eq!(listed, keys);
        assert_eq!(store.calls(StoreCall::List), 3);
    }

    #[tokio::test]
    async fn test_page_size_is_forwarded() {
        let store = store_with(&["a", "b", "c", "d"], 1000);
        let lister = ObjectLister::new(store.clone()).with_page_size(3);

        let all = lister.list_all_under_prefix("b", "").await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(store.calls(StoreCall::List), 2);
    }

    #[tokio::test]
    async fn test_list_all_fails_fast() {
        let store = store_with(&["a", "b", "c", "d", "e"], 2);
        store.fail_nth(StoreCall::List, 2);
        let lister = ObjectLister::new(store.clone());

        assert!(lister.list_all_under_prefix("b", "").await.is_err());
        assert_eq!(store.calls(StoreCall::List), 2);
    }

    #[tokio::test]
    async fn test_pager_is_not_restartable() {
        let store = store_with(&["a"], 10);
        let lister = ObjectLister::new(store.clone());
        let mut pager = lister.pages("b", "");

        assert_eq!(pager.next_page().await.unwrap().map(|p| p.len()), Some(1));
        assert!(pager.next_page().await.unwrap().is_none());
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(store.calls(StoreCall::List), 1);
    }

    #[tokio::test]
    async fn test_descendant_keys_include_marker() {
        let store = store_with(&["docs/", "docs/a.txt", "docsx/b.txt"], 10);
        let lister = ObjectLister::new(store);

        let keys = lister.descendant_keys("b", "docs/").await.unwrap();
        assert_eq!(keys, vec!["docs/", "docs/a.txt"]);
    }

    #[tokio::test]
    async fn test_descendant_keys_rejects_file_key() {
        let store = store_with(&["docs/a.txt"], 10);
        let lister = ObjectLister::new(store.clone());

        let err = lister.descendant_keys("b", "docs/a.txt").await.unwrap_err();
        assert!(matches!(err, OpError::IsFile(ref key) if key == "docs/a.txt"));
        assert_eq!(store.total_calls(), 0);
    }
}
