//! Folder and file operations
//!
//! Composite operations built from independent store primitives. Every
//! operation runs its primitive calls strictly one after another, in listing
//! order, and stops at the first failure. Nothing is retried or rolled back:
//! the result reports exactly which keys were completed so the caller can
//! resume, repair or report.
//!
//! Moves and renames have no atomic counterpart in the store. They run as a
//! copy phase followed by a delete phase, and [`MoveResult`] tells an
//! untouched source apart from one whose data now exists in both places.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{OpError, OpResult};
use crate::keys;
use crate::listing::ObjectLister;
use crate::s3::{ObjectMetadata, ObjectReader, ObjectStore, PutBody};

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of a multi-object operation
#[derive(Debug)]
pub struct OperationResult {
    /// Keys processed successfully, in execution order
    pub completed: Vec<String>,
    /// First error; processing stopped here
    pub error: Option<OpError>,
}

impl OperationResult {
    fn done(completed: Vec<String>) -> Self {
        Self {
            completed,
            error: None,
        }
    }

    fn failed(completed: Vec<String>, error: OpError) -> Self {
        Self {
            completed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Completed keys, or the error if the operation stopped early
    pub fn into_result(self) -> OpResult<Vec<String>> {
        match self.error {
            None => Ok(self.completed),
            Some(e) => Err(e),
        }
    }
}

/// Step of a move at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    /// Arguments rejected before any store call
    Validate,
    /// Listing the source folder failed
    Enumerate,
    Copy,
    Delete,
}

/// What a move left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Every object copied and every source deleted
    Completed,
    /// Failed before anything was written or removed
    Untouched,
    /// Failed after some writes or deletes; data may exist at both locations
    Partial,
}

/// Two-phase result of a move or rename
#[derive(Debug)]
pub struct MoveResult {
    /// Target key of the file or folder; empty when the arguments were
    /// rejected before a target could be formed
    pub target_key: String,
    /// Target keys written by the copy phase
    pub copied: Vec<String>,
    /// Source keys removed by the delete phase
    pub deleted: Vec<String>,
    pub error: Option<OpError>,
    pub failed_phase: Option<MovePhase>,
}

impl MoveResult {
    fn new(target_key: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            copied: Vec::new(),
            deleted: Vec::new(),
            error: None,
            failed_phase: None,
        }
    }

    fn rejected(target_key: impl Into<String>, error: OpError) -> Self {
        Self::new(target_key).fail(MovePhase::Validate, error)
    }

    fn fail(mut self, phase: MovePhase, error: OpError) -> Self {
        self.failed_phase = Some(phase);
        self.error = Some(error);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn outcome(&self) -> MoveOutcome {
        if self.error.is_none() {
            MoveOutcome::Completed
        } else if self.copied.is_empty() && self.deleted.is_empty() {
            MoveOutcome::Untouched
        } else {
            MoveOutcome::Partial
        }
    }

    /// Source keys that were both copied and deleted
    pub fn moved(&self) -> &[String] {
        &self.deleted
    }

    /// Target key on success, the error otherwise
    pub fn into_result(self) -> OpResult<String> {
        match self.error {
            None => Ok(self.target_key),
            Some(e) => Err(e),
        }
    }
}

fn require_folder(key: &str) -> OpResult<()> {
    if key.is_empty() {
        Err(OpError::InvalidArgument("folder key must not be empty".to_string()))
    } else if keys::is_file(key) {
        Err(OpError::IsFile(key.to_string()))
    } else {
        Ok(())
    }
}

fn require_file(key: &str) -> OpResult<()> {
    if key.is_empty() {
        Err(OpError::InvalidArgument("file key must not be empty".to_string()))
    } else if keys::is_folder(key) {
        Err(OpError::IsFolder(key.to_string()))
    } else {
        Ok(())
    }
}

/// A single key segment: non-empty, without `/`
fn require_segment(name: &str) -> OpResult<()> {
    if name.is_empty() {
        Err(OpError::InvalidArgument("name must not be empty".to_string()))
    } else if name.contains('/') {
        Err(OpError::InvalidArgument(format!(
            "name '{}' must not contain '/'",
            name
        )))
    } else {
        Ok(())
    }
}

/// A copy aimed at a folder lands inside it under the source's file name
fn resolve_copy_target(source_key: &str, target_key: &str) -> String {
    if keys::is_folder(target_key) {
        format!("{}{}", target_key, keys::file_name(source_key))
    } else {
        target_key.to_string()
    }
}

/// Target of a file rename: same folder, new base name, original extension.
///
/// The original extension is always appended, so a new name that already
/// carries one ends up with two.
fn rename_file_target(key: &str, new_base_name: &str) -> String {
    let parent = keys::parent_folder_key(key);
    match keys::raw_extension(keys::file_name(key)) {
        Some(ext) => format!("{}{}.{}", parent, new_base_name, ext),
        None => format!("{}{}", parent, new_base_name),
    }
}

/// Composite folder and file operations over an [`ObjectStore`]
#[derive(Clone)]
pub struct ObjectOperations {
    store: Arc<dyn ObjectStore>,
    lister: ObjectLister,
}

impl ObjectOperations {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        let lister = ObjectLister::new(Arc::clone(&store));
        Self { store, lister }
    }

    /// Enumerate descendants `page_size` keys per list call
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.lister = self.lister.with_page_size(page_size);
        self
    }

    pub fn lister(&self) -> &ObjectLister {
        &self.lister
    }

    /// Create an empty folder marker `parent_key + name + "/"`.
    ///
    /// An empty `parent_key` creates the folder at the bucket root.
    pub async fn create_folder(
        &self,
        bucket: &str,
        parent_key: &str,
        name: &str,
    ) -> OpResult<String> {
        if !parent_key.is_empty() {
            require_folder(parent_key)?;
        }
        require_segment(name)?;

        let key = format!("{}{}/", parent_key, name);
        self.store.put(bucket, &key, PutBody::Empty).await?;

        tracing::info!("Created folder s3://{}/{}", bucket, key);
        Ok(key)
    }

    /// Delete one object
    pub async fn delete_file(&self, bucket: &str, key: &str) -> OpResult<()> {
        self.store.delete(bucket, key).await?;
        tracing::debug!("Deleted s3://{}/{}", bucket, key);
        Ok(())
    }

    /// Delete a folder marker and every object under it
    pub async fn delete_folder(&self, bucket: &str, key: &str) -> OperationResult {
        if let Err(e) = require_folder(key) {
            return OperationResult::failed(Vec::new(), e);
        }

        let worklist = match self.lister.descendant_keys(bucket, key).await {
            Ok(keys) => keys,
            Err(e) => return OperationResult::failed(Vec::new(), e),
        };

        let result = self.delete_keys(bucket, &worklist).await;
        Self::log_result("Delete folder", bucket, key, worklist.len(), &result);
        result
    }

    async fn delete_keys(&self, bucket: &str, worklist: &[String]) -> OperationResult {
        let mut deleted = Vec::with_capacity(worklist.len());
        for key in worklist {
            if let Err(e) = self.delete_file(bucket, key).await {
                return OperationResult::failed(deleted, e);
            }
            deleted.push(key.clone());
        }
        OperationResult::done(deleted)
    }

    /// Store-side copy of one object. Returns the resolved target key.
    ///
    /// A folder `target_key` means "into this folder": the source's file name
    /// is appended. Copying onto itself is rejected without a store call.
    pub async fn copy_file(
        &self,
        bucket: &str,
        source_key: &str,
        target_key: &str,
    ) -> OpResult<String> {
        if source_key.is_empty() {
            return Err(OpError::InvalidArgument(
                "source key must not be empty".to_string(),
            ));
        }

        let target = resolve_copy_target(source_key, target_key);
        if target == source_key {
            return Err(OpError::SameSourceAndTarget(target));
        }

        self.store.copy(bucket, source_key, &target).await?;
        tracing::debug!("Copied s3://{}/{} to {}", bucket, source_key, target);
        Ok(target)
    }

    /// Copy every object under `source_key` to the same relative key under
    /// `target_key`
    pub async fn copy_folder(
        &self,
        bucket: &str,
        source_key: &str,
        target_key: &str,
    ) -> OperationResult {
        if let Err(e) = Self::validate_folder_pair(source_key, target_key) {
            return OperationResult::failed(Vec::new(), e);
        }

        let worklist = match self.lister.descendant_keys(bucket, source_key).await {
            Ok(keys) => keys,
            Err(e) => return OperationResult::failed(Vec::new(), e),
        };

        let result = self
            .copy_keys(bucket, &worklist, source_key, target_key)
            .await;
        Self::log_result("Copy folder", bucket, source_key, worklist.len(), &result);
        result
    }

    fn validate_folder_pair(source_key: &str, target_key: &str) -> OpResult<()> {
        require_folder(source_key)?;
        require_folder(target_key)?;
        if source_key == target_key {
            return Err(OpError::SameSourceAndTarget(source_key.to_string()));
        }
        // Rewritten keys would land on source keys not yet processed
        if source_key.starts_with(target_key) {
            return Err(OpError::SourceInsideTarget {
                source_key: source_key.to_string(),
                target_key: target_key.to_string(),
            });
        }
        Ok(())
    }

    /// Copy each key of `worklist` with its `source_prefix` rewritten to
    /// `target_prefix`. Completed entries are target keys.
    async fn copy_keys(
        &self,
        bucket: &str,
        worklist: &[String],
        source_prefix: &str,
        target_prefix: &str,
    ) -> OperationResult {
        let mut copied = Vec::with_capacity(worklist.len());
        for key in worklist {
            let Some(target) = keys::rebase_key(key, source_prefix, target_prefix) else {
                let e = OpError::InvalidArgument(format!(
                    "'{}' is not under '{}'",
                    key, source_prefix
                ));
                return OperationResult::failed(copied, e);
            };

            match self.copy_file(bucket, key, &target).await {
                Ok(written) => copied.push(written),
                Err(e) => return OperationResult::failed(copied, e),
            }
        }
        OperationResult::done(copied)
    }

    /// Copy one object, then delete the source
    pub async fn move_file(&self, bucket: &str, source_key: &str, target_key: &str) -> MoveResult {
        if source_key == target_key {
            return MoveResult::rejected(
                target_key,
                OpError::SameSourceAndTarget(source_key.to_string()),
            );
        }

        let mut result = MoveResult::new(resolve_copy_target(source_key, target_key));

        match self.copy_file(bucket, source_key, target_key).await {
            Ok(written) => result.copied.push(written),
            Err(e) => {
                let phase = if e.is_validation() {
                    MovePhase::Validate
                } else {
                    MovePhase::Copy
                };
                return result.fail(phase, e);
            }
        }

        if let Err(e) = self.delete_file(bucket, source_key).await {
            tracing::warn!(
                "Moved s3://{}/{} to {} but could not delete the source: {}",
                bucket,
                source_key,
                result.target_key,
                e
            );
            return result.fail(MovePhase::Delete, e);
        }
        result.deleted.push(source_key.to_string());

        tracing::debug!("Moved s3://{}/{} to {}", bucket, source_key, result.target_key);
        result
    }

    /// Copy a folder's objects under `target_key`, then delete the originals.
    ///
    /// Both phases work from one listing taken up front, so objects created
    /// under the source after enumeration are neither copied nor deleted.
    pub async fn move_folder(&self, bucket: &str, source_key: &str, target_key: &str) -> MoveResult {
        if let Err(e) = Self::validate_folder_pair(source_key, target_key) {
            return MoveResult::rejected(target_key, e);
        }
        if target_key.starts_with(source_key) {
            return MoveResult::rejected(
                target_key,
                OpError::TargetInsideSource {
                    source_key: source_key.to_string(),
                    target_key: target_key.to_string(),
                },
            );
        }

        let result = MoveResult::new(target_key);
        let worklist = match self.lister.descendant_keys(bucket, source_key).await {
            Ok(keys) => keys,
            Err(e) => return result.fail(MovePhase::Enumerate, e),
        };

        self.move_worklist(bucket, source_key, worklist, result).await
    }

    async fn move_worklist(
        &self,
        bucket: &str,
        source_key: &str,
        worklist: Vec<String>,
        mut result: MoveResult,
    ) -> MoveResult {
        let copy = self
            .copy_keys(bucket, &worklist, source_key, &result.target_key)
            .await;
        result.copied = copy.completed;
        if let Some(e) = copy.error {
            tracing::warn!(
                "Move of s3://{}/{} stopped in copy phase after {} of {} objects: {}",
                bucket,
                source_key,
                result.copied.len(),
                worklist.len(),
                e
            );
            return result.fail(MovePhase::Copy, e);
        }

        let delete = self.delete_keys(bucket, &worklist).await;
        result.deleted = delete.completed;
        if let Some(e) = delete.error {
            tracing::warn!(
                "Move of s3://{}/{} stopped in delete phase after {} of {} objects; copies exist under {}: {}",
                bucket,
                source_key,
                result.deleted.len(),
                worklist.len(),
                result.target_key,
                e
            );
            return result.fail(MovePhase::Delete, e);
        }

        tracing::info!(
            "Moved {} objects from s3://{}/{} to {}",
            worklist.len(),
            bucket,
            source_key,
            result.target_key
        );
        result
    }

    /// Rename a file within its folder, keeping its extension
    pub async fn rename_file(&self, bucket: &str, key: &str, new_base_name: &str) -> MoveResult {
        if let Err(e) = require_file(key).and_then(|_| require_segment(new_base_name)) {
            return MoveResult::rejected(String::new(), e);
        }

        if let Some(ext) = keys::raw_extension(keys::file_name(key)) {
            let suffix = format!(".{}", ext.to_lowercase());
            if new_base_name.to_lowercase().ends_with(&suffix) {
                tracing::warn!(
                    "New name '{}' for s3://{}/{} already ends with '.{}'; the extension will be doubled",
                    new_base_name,
                    bucket,
                    key,
                    ext
                );
            }
        }

        let target = rename_file_target(key, new_base_name);
        self.move_file(bucket, key, &target).await
    }

    /// Rename a folder within its parent by moving every descendant object
    /// one at a time
    pub async fn rename_folder(&self, bucket: &str, key: &str, new_base_name: &str) -> MoveResult {
        if let Err(e) = require_folder(key).and_then(|_| require_segment(new_base_name)) {
            return MoveResult::rejected(String::new(), e);
        }

        let target = format!("{}{}/", keys::parent_folder_key(key), new_base_name);
        if target == key {
            return MoveResult::rejected(target, OpError::SameSourceAndTarget(key.to_string()));
        }

        let mut result = MoveResult::new(target);
        let worklist = match self.lister.descendant_keys(bucket, key).await {
            Ok(keys) => keys,
            Err(e) => return result.fail(MovePhase::Enumerate, e),
        };

        for source in &worklist {
            let Some(new_key) = keys::rebase_key(source, key, &result.target_key) else {
                let e = OpError::InvalidArgument(format!("'{}' is not under '{}'", source, key));
                return result.fail(MovePhase::Validate, e);
            };

            let moved = self.move_file(bucket, source, &new_key).await;
            result.copied.extend(moved.copied);
            result.deleted.extend(moved.deleted);
            if let Some(e) = moved.error {
                tracing::warn!(
                    "Rename of s3://{}/{} stopped at {} after moving {} of {} objects: {}",
                    bucket,
                    key,
                    source,
                    result.deleted.len(),
                    worklist.len(),
                    e
                );
                let phase = moved.failed_phase.unwrap_or(MovePhase::Copy);
                return result.fail(phase, e);
            }
        }

        tracing::info!(
            "Renamed s3://{}/{} to {} ({} objects)",
            bucket,
            key,
            result.target_key,
            worklist.len()
        );
        result
    }

    /// Upload a local file to `key`
    pub async fn upload_file(&self, bucket: &str, local_path: &Path, key: &str) -> OpResult<String> {
        require_file(key)?;

        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| OpError::io(local_path, e))?;
        if !metadata.is_file() {
            return Err(OpError::InvalidArgument(format!(
                "{:?} is not a regular file",
                local_path
            )));
        }

        self.store
            .put(bucket, key, PutBody::File(local_path.to_path_buf()))
            .await?;

        tracing::info!(
            "Uploaded {:?} to s3://{}/{} ({} bytes)",
            local_path,
            bucket,
            key,
            metadata.len()
        );
        Ok(key.to_string())
    }

    /// Upload a local file into a folder under its own file name
    pub async fn upload_file_to_folder(
        &self,
        bucket: &str,
        local_path: &Path,
        folder_key: &str,
    ) -> OpResult<String> {
        if !folder_key.is_empty() {
            require_folder(folder_key)?;
        }

        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                OpError::InvalidArgument(format!("{:?} has no usable file name", local_path))
            })?;

        let key = format!("{}{}", folder_key, file_name);
        self.upload_file(bucket, local_path, &key).await
    }

    /// Stream one object into `local_path`. Returns the number of bytes
    /// written. The parent directory of `local_path` must exist.
    ///
    /// A failed transfer removes the partly written file.
    pub async fn download_file(&self, bucket: &str, key: &str, local_path: &Path) -> OpResult<u64> {
        require_file(key)?;

        let mut reader = self.store.get(bucket, key).await?;
        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| OpError::io(local_path, e))?;

        match Self::stream_to_file(&mut reader, &mut file, local_path).await {
            Ok(written) => {
                tracing::debug!(
                    "Downloaded s3://{}/{} to {:?} ({} bytes)",
                    bucket,
                    key,
                    local_path,
                    written
                );
                Ok(written)
            }
            Err(e) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(local_path).await {
                    tracing::warn!(
                        "Could not remove partial download {:?}: {}",
                        local_path,
                        remove_err
                    );
                }
                tracing::warn!("Download of s3://{}/{} failed: {}", bucket, key, e);
                Err(e)
            }
        }
    }

    /// Copy `reader` into `file`. Read failures are store errors, write
    /// failures are local IO errors.
    async fn stream_to_file(
        reader: &mut ObjectReader,
        file: &mut tokio::fs::File,
        local_path: &Path,
    ) -> OpResult<u64> {
        let mut buf = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| OpError::Store(anyhow::Error::from(e)))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|e| OpError::io(local_path, e))?;
            written += n as u64;
        }

        file.flush().await.map_err(|e| OpError::io(local_path, e))?;
        Ok(written)
    }

    /// Create `dir` itself, or accept it when it already is a directory.
    /// Missing ancestors are not created.
    async fn prepare_download_dir(dir: &Path) -> OpResult<()> {
        match tokio::fs::create_dir(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let is_dir = tokio::fs::metadata(dir)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if is_dir {
                    Ok(())
                } else {
                    Err(OpError::io(dir, e))
                }
            }
            Err(e) => Err(OpError::io(dir, e)),
        }
    }

    /// Download every file under a folder into `local_dir`, flattened.
    ///
    /// Folder markers are skipped. Files sharing a name in different
    /// subfolders overwrite each other, last in listing order wins.
    pub async fn download_folder(
        &self,
        bucket: &str,
        folder_key: &str,
        local_dir: &Path,
    ) -> OperationResult {
        if let Err(e) = require_folder(folder_key) {
            return OperationResult::failed(Vec::new(), e);
        }

        let worklist = match self.lister.descendant_keys(bucket, folder_key).await {
            Ok(keys) => keys,
            Err(e) => return OperationResult::failed(Vec::new(), e),
        };

        if let Err(e) = Self::prepare_download_dir(local_dir).await {
            return OperationResult::failed(Vec::new(), e);
        }

        let files: Vec<&String> = worklist.iter().filter(|k| keys::is_file(k)).collect();
        let mut downloaded = Vec::with_capacity(files.len());
        for key in &files {
            let target = local_dir.join(keys::file_name(key));
            if let Err(e) = self.download_file(bucket, key, &target).await {
                let result = OperationResult::failed(downloaded, e);
                Self::log_result("Download folder", bucket, folder_key, files.len(), &result);
                return result;
            }
            downloaded.push((*key).clone());
        }

        let result = OperationResult::done(downloaded);
        Self::log_result("Download folder", bucket, folder_key, files.len(), &result);
        result
    }

    /// Whether an object exists at `key`
    pub async fn exists(&self, bucket: &str, key: &str) -> OpResult<bool> {
        Ok(self.store.head(bucket, key).await?.is_some())
    }

    /// Metadata of one object, `None` when it does not exist
    pub async fn properties(&self, bucket: &str, key: &str) -> OpResult<Option<ObjectMetadata>> {
        Ok(self.store.head(bucket, key).await?)
    }

    fn log_result(action: &str, bucket: &str, key: &str, total: usize, result: &OperationResult) {
        match &result.error {
            None => tracing::info!(
                "{} s3://{}/{}: {} objects",
                action,
                bucket,
                key,
                result.completed.len()
            ),
            Some(e) => tracing::warn!(
                "{} s3://{}/{} stopped after {} of {} objects: {}",
                action,
                bucket,
                key,
                result.completed.len(),
                total,
                e
            ),
        }
    }
}
