//! AWS S3 client wrapper

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use crate::s3::store::{ObjectReader, ObjectStore, PutBody};
use crate::s3::types::{ListObjectsResult, ListRequest, ObjectMetadata, ObjectSummary};

/// Connection options for [`S3Client::with_config`]
#[derive(Debug, Clone, Default)]
pub struct S3ClientConfig {
    /// Named profile from the shared AWS config files
    pub profile: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// S3 client wrapper implementing [`ObjectStore`]
pub struct S3Client {
    client: Client,
    current_region: String,
}

impl S3Client {
    /// Create a new S3 client for the given profile
    pub async fn new(profile_name: Option<&str>) -> Result<Self> {
        Self::with_config(S3ClientConfig {
            profile: profile_name.map(|p| p.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Create a client from explicit connection options
    pub async fn with_config(config: S3ClientConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = config.profile.as_deref() {
            loader = loader.profile_name(profile);
        }

        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }

        if let (Some(access_key), Some(secret_key)) =
            (config.access_key_id.clone(), config.secret_access_key.clone())
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "s3-folders-static",
            ));
        }

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = config.endpoint_url.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }

        let current_region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());

        tracing::debug!(
            "Created S3 client: region={}, endpoint={:?}",
            current_region,
            config.endpoint_url
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            current_region,
        })
    }

    /// Create a bucket (test and setup helper)
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .with_context(|| format!("Failed to create bucket {}", bucket))?;

        Ok(())
    }

    /// Get the current region
    pub fn region(&self) -> &str {
        &self.current_region
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list(&self, bucket: &str, request: ListRequest) -> Result<ListObjectsResult> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter)
            .set_continuation_token(request.continuation_token)
            .set_max_keys(request.max_keys)
            .send()
            .await
            .with_context(|| format!("Failed to list s3://{}/{}", bucket, request.prefix))?;

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(|s| s.to_string()))
            .collect();

        let objects = response
            .contents()
            .iter()
            .map(|obj| ObjectSummary {
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size().unwrap_or(0) as u64,
                last_modified: obj.last_modified().map(to_utc),
                etag: obj.e_tag().map(|s| s.to_string()),
                storage_class: obj.storage_class().map(|s| s.as_str().to_string()),
            })
            .collect();

        Ok(ListObjectsResult {
            objects,
            common_prefixes,
            next_token: response.next_continuation_token().map(|s| s.to_string()),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectMetadata {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0) as u64,
                last_modified: output.last_modified().map(to_utc),
                etag: output.e_tag().map(|s| s.to_string()),
                content_type: output.content_type().map(|s| s.to_string()),
                storage_class: output.storage_class().map(|s| s.as_str().to_string()),
            })),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);
                if not_found {
                    Ok(None)
                } else {
                    Err(anyhow::Error::new(err)
                        .context(format!("Failed to head s3://{}/{}", bucket, key)))
                }
            }
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get s3://{}/{}", bucket, key))?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn put(&self, bucket: &str, key: &str, body: PutBody) -> Result<()> {
        let stream = match body {
            PutBody::Empty => ByteStream::from(Vec::new()),
            PutBody::Bytes(data) => ByteStream::from(data),
            PutBody::File(path) => ByteStream::from_path(&path)
                .await
                .with_context(|| format!("Failed to open {:?} for upload", path))?,
        };

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .send()
            .await
            .with_context(|| format!("Failed to put s3://{}/{}", bucket, key))?;

        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete s3://{}/{}", bucket, key))?;

        Ok(())
    }

    async fn copy(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        let copy_source = format!("{}/{}", bucket, encode_key(source_key));

        self.client
            .copy_object()
            .bucket(bucket)
            .key(target_key)
            .copy_source(copy_source)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to copy s3://{}/{} to {}",
                    bucket, source_key, target_key
                )
            })?;

        Ok(())
    }
}

fn to_utc(d: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(d.secs(), d.subsec_nanos()).unwrap_or_default()
}

/// Percent-encode each key segment for the copy-source header
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
