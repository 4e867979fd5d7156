//! Integration tests for the S3 client and folder operations using MinIO via
//! testcontainers
//!
//! These tests require Docker to be running and use the testcontainers crate
//! to spin up a MinIO instance for realistic S3 testing.
//!
//! Run with: cargo test --test s3_integration
//!
//! Note: Tests are conditionally skipped if Docker is not available.

use s3_folders::s3::{ObjectStore, PutBody, S3Client, S3ClientConfig};
use s3_folders::{MoveOutcome, ObjectOperations, SearchEngine, SearchQuery};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::minio::MinIO;
use tokio::io::AsyncReadExt;

/// MinIO default credentials
const MINIO_ACCESS_KEY: &str = "minioadmin";
const MINIO_SECRET_KEY: &str = "minioadmin";

/// Test helper to check if Docker is available
fn docker_available() -> bool {
    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Helper to get MinIO endpoint URL from container
async fn get_minio_endpoint(container: &ContainerAsync<MinIO>) -> String {
    let host = container.get_host().await.expect("Failed to get container host");
    let port = container
        .get_host_port_ipv4(9000)
        .await
        .expect("Failed to get MinIO port");
    format!("http://{}:{}", host, port)
}

fn minio_config(endpoint: &str, region: &str) -> S3ClientConfig {
    S3ClientConfig {
        endpoint_url: Some(endpoint.to_string()),
        force_path_style: true,
        region: Some(region.to_string()),
        access_key_id: Some(MINIO_ACCESS_KEY.to_string()),
        secret_access_key: Some(MINIO_SECRET_KEY.to_string()),
        ..Default::default()
    }
}

/// Start MinIO and return a client with `bucket` created
async fn start_minio(bucket: &str) -> (ContainerAsync<MinIO>, Arc<S3Client>) {
    let container = MinIO::default()
        .with_env_var("MINIO_ROOT_USER", MINIO_ACCESS_KEY)
        .with_env_var("MINIO_ROOT_PASSWORD", MINIO_SECRET_KEY)
        .start()
        .await
        .expect("Failed to start MinIO container");

    let endpoint = get_minio_endpoint(&container).await;

    // Wait for MinIO to be ready
    tokio::time::sleep(Duration::from_secs(2)).await;

    let client = S3Client::with_config(minio_config(&endpoint, "us-east-1"))
        .await
        .expect("Failed to create MinIO client");
    client.create_bucket(bucket).await.expect("Failed to create bucket");

    (container, Arc::new(client))
}

async fn put_text(client: &S3Client, bucket: &str, key: &str, text: &str) {
    client
        .put(bucket, key, PutBody::Bytes(text.as_bytes().to_vec().into()))
        .await
        .expect("Failed to put object");
}

async fn read_all(client: &S3Client, bucket: &str, key: &str) -> Vec<u8> {
    let mut reader = client.get(bucket, key).await.expect("Failed to get object");
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await.expect("Failed to read body");
    data
}

/// Test object upload, download and head
#[tokio::test]
async fn test_put_get_head() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let (_container, client) = start_minio("data-bucket").await;

    put_text(&client, "data-bucket", "test-file.txt", "Hello, MinIO!").await;
    assert_eq!(read_all(&client, "data-bucket", "test-file.txt").await, b"Hello, MinIO!");

    let meta = client.head("data-bucket", "test-file.txt").await.unwrap().unwrap();
    assert_eq!(meta.size, 13);
    assert!(client.head("data-bucket", "missing.txt").await.unwrap().is_none());
}

/// Test one-level listing and full paginated listing
#[tokio::test]
async fn test_listing_with_pagination() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let (_container, client) = start_minio("files-bucket").await;

    put_text(&client, "files-bucket", "docs/readme.md", "# Readme").await;
    put_text(&client, "files-bucket", "docs/guide.md", "# Guide").await;
    put_text(&client, "files-bucket", "src/main.rs", "fn main() {}").await;
    put_text(&client, "files-bucket", "root.txt", "root file").await;
    for i in 0..25 {
        let key = format!("many/file-{:04}.txt", i);
        put_text(&client, "files-bucket", &key, &format!("Content {}", i)).await;
    }

    let ops = ObjectOperations::new(client.clone()).with_page_size(10);

    let top = ops.lister().list_one_level("files-bucket", "").await.unwrap();
    assert_eq!(top.folders, vec!["docs/", "many/", "src/"]);
    let files: Vec<&str> = top.files.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(files, vec!["root.txt"]);

    let all = ops
        .lister()
        .list_all_under_prefix("files-bucket", "many/")
        .await
        .unwrap();
    assert_eq!(all.len(), 25);
}

/// Rename a folder on a real store
#[tokio::test]
async fn test_rename_folder() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let (_container, client) = start_minio("rename-test").await;
    let ops = ObjectOperations::new(client.clone());

    ops.create_folder("rename-test", "", "docs").await.unwrap();
    put_text(&client, "rename-test", "docs/readme.txt", "hi").await;
    put_text(&client, "rename-test", "docs/img/logo.png", "png bytes").await;

    let result = ops.rename_folder("rename-test", "docs/", "documents").await;
    assert_eq!(result.outcome(), MoveOutcome::Completed, "{:?}", result.error);

    let keys: Vec<String> = ops
        .lister()
        .list_all_under_prefix("rename-test", "")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(
        keys,
        vec!["documents/", "documents/img/logo.png", "documents/readme.txt"]
    );
    assert_eq!(read_all(&client, "rename-test", "documents/readme.txt").await, b"hi");
}

/// Copy and delete folders, including keys that need URL encoding
#[tokio::test]
async fn test_copy_and_delete_folder() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let (_container, client) = start_minio("copy-test").await;
    let ops = ObjectOperations::new(client.clone());

    let special_keys = [
        "src/file with spaces.txt",
        "src/file+plus.txt",
        "src/nested/UPPERCASE.TXT",
    ];
    for key in &special_keys {
        put_text(&client, "copy-test", key, key).await;
    }

    let copy = ops.copy_folder("copy-test", "src/", "dst/").await;
    assert!(copy.is_success(), "{:?}", copy.error);
    assert_eq!(copy.completed.len(), 3);
    assert_eq!(
        read_all(&client, "copy-test", "dst/file with spaces.txt").await,
        b"src/file with spaces.txt"
    );

    let delete = ops.delete_folder("copy-test", "src/").await;
    assert!(delete.is_success(), "{:?}", delete.error);
    assert!(!ops.exists("copy-test", "src/file+plus.txt").await.unwrap());
    assert!(ops.exists("copy-test", "dst/file+plus.txt").await.unwrap());
}

/// Search with filters against a real store
#[tokio::test]
async fn test_search() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let (_container, client) = start_minio("search-test").await;

    for key in [
        "reports/2024/q1-report.csv",
        "reports/2024/q2-report.csv",
        "reports/2024/summary.txt",
        "reports/2023/q4-report.csv",
    ] {
        put_text(&client, "search-test", key, "x").await;
    }

    let engine = SearchEngine::new(ObjectOperations::new(client.clone()).lister().clone());
    let query = SearchQuery::new("reports/")
        .name("REPORT")
        .extension("csv")
        .folder("2024");

    let results = engine.search("search-test", &query).await.unwrap();
    let keys: Vec<&str> = results.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["reports/2024/q1-report.csv", "reports/2024/q2-report.csv"]
    );
}

/// Test region configuration
#[tokio::test]
async fn test_region_configuration() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let (container, _client) = start_minio("region-test").await;
    let endpoint = get_minio_endpoint(&container).await;

    let client = S3Client::with_config(minio_config(&endpoint, "eu-west-1"))
        .await
        .expect("Failed to create client");
    assert_eq!(client.region(), "eu-west-1");
}

/// Test S3ClientConfig defaults
#[test]
fn test_s3_client_config_defaults() {
    let config = S3ClientConfig::default();
    assert!(config.profile.is_none());
    assert!(config.endpoint_url.is_none());
    assert!(!config.force_path_style);
    assert!(config.region.is_none());
    assert!(config.access_key_id.is_none());
    assert!(config.secret_access_key.is_none());
}
