//! Engine settings persistence
//!
//! Stores connection and listing preferences in the platform-specific app
//! data folder:
//! - Linux: ~/.config/s3-folders/settings.json
//! - Windows: %APPDATA%/s3-folders/settings.json
//! - macOS: ~/Library/Application Support/s3-folders/settings.json

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::listing::ObjectLister;
use crate::operations::ObjectOperations;
use crate::s3::{ObjectStore, S3ClientConfig};
use crate::search::{SearchEngine, SearchQuery};

const DEFAULT_PAGE_SIZE: i32 = 1000;
const DEFAULT_SEARCH_MAX_RESULTS: i64 = 100;

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

fn default_search_max_results() -> i64 {
    DEFAULT_SEARCH_MAX_RESULTS
}

/// Settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// AWS profile name; the SDK default chain is used when unset
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Endpoint of an S3-compatible store
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,

    /// Keys requested per list call
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// Result cap applied to searches that do not set their own
    #[serde(default = "default_search_max_results")]
    pub search_max_results: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            page_size: DEFAULT_PAGE_SIZE,
            search_max_results: DEFAULT_SEARCH_MAX_RESULTS,
        }
    }
}

impl Settings {
    /// Load settings from disk, returning defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;

        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings from {:?}", path))?;

        tracing::info!(
            "Loaded settings: profile={:?}, region={:?}, endpoint={:?}, page_size={}",
            settings.profile,
            settings.region,
            settings.endpoint_url,
            settings.page_size
        );

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    /// Save settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;

        tracing::debug!("Saved settings to {:?}", path);

        Ok(())
    }

    /// Get the path to the settings file
    pub fn settings_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "github.n-orlov", "s3-folders")
            .context("Failed to determine settings directory")?;

        Ok(proj_dirs.config_dir().join("settings.json"))
    }

    /// Connection options for [`crate::s3::S3Client::with_config`].
    ///
    /// Static credentials are never persisted; they come from the profile or
    /// the SDK default chain.
    pub fn client_config(&self) -> S3ClientConfig {
        S3ClientConfig {
            profile: self.profile.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            region: self.region.clone(),
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Lister over `store` using the configured page size
    pub fn lister(&self, store: Arc<dyn ObjectStore>) -> ObjectLister {
        ObjectLister::new(store).with_page_size(self.page_size)
    }

    /// Operations over `store` using the configured page size
    pub fn operations(&self, store: Arc<dyn ObjectStore>) -> ObjectOperations {
        ObjectOperations::new(store).with_page_size(self.page_size)
    }

    pub fn search_engine(&self, store: Arc<dyn ObjectStore>) -> SearchEngine {
        SearchEngine::new(self.lister(store))
    }

    /// Empty query under `prefix` carrying the configured result cap
    pub fn search_query(&self, prefix: &str) -> SearchQuery {
        SearchQuery::new(prefix).max_results(self.search_max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.profile.is_none());
        assert!(settings.endpoint_url.is_none());
        assert!(!settings.force_path_style);
        assert_eq!(settings.page_size, 1000);
        assert_eq!(settings.search_max_results, 100);
    }

    #[test]
    fn test_settings_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            profile: Some("production".to_string()),
            region: Some("eu-west-1".to_string()),
            endpoint_url: Some("http://localhost:9000".to_string()),
            force_path_style: true,
            page_size: 250,
            search_max_results: 20,
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_settings_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_settings_partial_deserialization() {
        // Should handle missing fields gracefully
        let json = r#"{"profile": "test"}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.profile, Some("test".to_string()));
        assert!(settings.region.is_none());
        assert_eq!(settings.page_size, 1000);
        assert_eq!(settings.search_max_results, 100);
    }

    #[test]
    fn test_settings_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn test_client_config_from_settings() {
        let settings = Settings {
            profile: Some("dev".to_string()),
            endpoint_url: Some("http://minio:9000".to_string()),
            force_path_style: true,
            ..Default::default()
        };
        let config = settings.client_config();

        assert_eq!(config.profile.as_deref(), Some("dev"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://minio:9000"));
        assert!(config.force_path_style);
        assert!(config.access_key_id.is_none());
    }

    #[tokio::test]
    async fn test_search_uses_configured_cap() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..10 {
            store.insert("b", &format!("k/{}.txt", i), Vec::<u8>::new());
        }
        let settings = Settings {
            search_max_results: 3,
            ..Default::default()
        };

        let results = settings
            .search_engine(store)
            .search("b", &settings.search_query("k/"))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }
}
