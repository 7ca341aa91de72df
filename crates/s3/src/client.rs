//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from r2up-core.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::RequestChecksumCalculation;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use tracing::debug;

use r2up_core::{
    CompletedPart, Config, Error, ObjectInfo, ObjectPath, ObjectStore, ProgressTracker, Result,
    RetryConfig, StoreConfig, TimeoutConfig,
};

use crate::body::progress_stream;

/// S3 store backed by aws-sdk-s3
pub struct S3Store {
    inner: aws_sdk_s3::Client,
}

impl S3Store {
    /// Create a client from a loaded configuration file
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.store, &config.retry, &config.timeout).await
    }

    /// Create a client with static credentials and path-style addressing
    pub async fn new(
        store: &StoreConfig,
        retry: &RetryConfig,
        timeout: &TimeoutConfig,
    ) -> Result<Self> {
        store.validate()?;
        let endpoint = store.endpoint_url();

        let credentials = aws_credential_types::Credentials::new(
            &store.access_key,
            &store.secret_key,
            None, // session token
            None, // expiry
            "r2up-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(store.region.clone()))
            .endpoint_url(&endpoint)
            .retry_config(sdk_retry_config(retry))
            .timeout_config(sdk_timeout_config(timeout))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();
        debug!(endpoint = %endpoint, region = %store.region, "S3 client configured");

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Map retry settings onto the SDK's standard retry strategy
pub fn sdk_retry_config(retry: &RetryConfig) -> aws_smithy_types::retry::RetryConfig {
    aws_smithy_types::retry::RetryConfig::standard()
        .with_max_attempts(retry.max_attempts.max(1))
        .with_initial_backoff(Duration::from_millis(retry.initial_backoff_ms))
        .with_max_backoff(Duration::from_millis(retry.max_backoff_ms))
}

pub fn sdk_timeout_config(timeout: &TimeoutConfig) -> aws_smithy_types::timeout::TimeoutConfig {
    aws_smithy_types::timeout::TimeoutConfig::builder()
        .connect_timeout(Duration::from_millis(timeout.connect_ms))
        .operation_timeout(Duration::from_millis(timeout.operation_ms))
        .build()
}

fn clean_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn timestamp(value: &DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(value.secs(), value.subsec_nanos() as i32).ok()
}

fn transfer_error(operation: &str, path: &ObjectPath, err: impl std::error::Error) -> Error {
    Error::Transfer(format!("{operation} {path}: {}", DisplayErrorContext(&err)))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                match status {
                    Some(404) => Err(Error::BucketNotFound(bucket.to_string())),
                    Some(401 | 403) => Err(Error::AccessDenied(bucket.to_string())),
                    _ => Err(Error::ConnectionFailed(format!(
                        "{bucket}: {}",
                        DisplayErrorContext(&e)
                    ))),
                }
            }
        }
    }

    async fn head_object(&self, path: &ObjectPath) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_not_found()) {
                    Error::ObjectNotFound(path.to_string())
                } else {
                    transfer_error("HeadObject", path, e)
                }
            })?;

        let size = response.content_length().unwrap_or(0);
        let mut info = ObjectInfo::file(&path.key, size);
        info.last_modified = response.last_modified().and_then(timestamp);
        info.etag = response.e_tag().map(clean_etag);
        info.content_type = response.content_type().map(str::to_string);
        if let Some(metadata) = response.metadata() {
            info.metadata = metadata.clone();
        }

        Ok(info)
    }

    async fn put_object(
        &self,
        path: &ObjectPath,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
        progress: Arc<dyn ProgressTracker>,
    ) -> Result<ObjectInfo> {
        let size = data.len() as i64;

        let response = self
            .inner
            .put_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .content_length(size)
            .body(progress_stream(data, progress))
            .send()
            .await
            .map_err(|e| transfer_error("PutObject", path, e))?;

        let mut info = ObjectInfo::file(&path.key, size);
        info.etag = response.e_tag().map(clean_etag);
        info.content_type = Some(content_type.to_string());
        info.metadata = metadata.clone();
        info.last_modified = Some(jiff::Timestamp::now());

        Ok(info)
    }

    async fn create_multipart_upload(
        &self,
        path: &ObjectPath,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(&path.bucket)
            .key(&path.key)
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(|e| transfer_error("CreateMultipartUpload", path, e))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Transfer(format!("No upload id returned for {path}")))
    }

    async fn upload_part(
        &self,
        path: &ObjectPath,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String> {
        let response = self
            .inner
            .upload_part()
            .bucket(&path.bucket)
            .key(&path.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| transfer_error("UploadPart", path, e))?;

        response.e_tag().map(clean_etag).ok_or_else(|| {
            Error::Transfer(format!("No ETag returned for part {part_number} of {path}"))
        })
    }

    async fn complete_multipart_upload(
        &self,
        path: &ObjectPath,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let parts = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(&path.bucket)
            .key(&path.key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| transfer_error("CompleteMultipartUpload", path, e))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, path: &ObjectPath, upload_id: &str) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(&path.bucket)
            .key(&path.key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| transfer_error("AbortMultipartUpload", path, e))?;

        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectInfo>> {
        let mut request = self.inner.list_objects_v2().bucket(bucket).max_keys(max_keys);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transfer_error("ListObjectsV2", &ObjectPath::new(bucket, prefix), e))?;

        let items = response
            .contents()
            .iter()
            .map(|object| {
                let key = object.key().unwrap_or_default();
                let mut info = ObjectInfo::file(key, object.size().unwrap_or(0));
                info.last_modified = object.last_modified().and_then(timestamp);
                info.etag = object.e_tag().map(clean_etag);
                info
            })
            .collect();

        Ok(items)
    }

    async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| transfer_error("DeleteObject", path, e))?;

        Ok(())
    }

    async fn presigned_url(&self, path: &ObjectPath, expires: Duration) -> Result<String> {
        let config = PresigningConfig::expires_in(expires)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let request = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .presigned(config)
            .await
            .map_err(|e| transfer_error("Presign", path, e))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_etag() {
        assert_eq!(clean_etag("\"abc123\""), "abc123");
        assert_eq!(clean_etag("abc-3"), "abc-3");
    }

    #[test]
    fn test_timestamp_conversion() {
        let dt = DateTime::from_secs(1_700_000_000);
        let ts = timestamp(&dt).unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
    }

    #[test]
    fn test_retry_settings_map_to_sdk() {
        let retry = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
        };
        let sdk = sdk_retry_config(&retry);
        assert_eq!(sdk.max_attempts(), 5);
        assert_eq!(sdk.initial_backoff(), Duration::from_millis(250));
        assert_eq!(sdk.max_backoff(), Duration::from_secs(4));

        let zero = RetryConfig {
            max_attempts: 0,
            ..retry
        };
        assert_eq!(sdk_retry_config(&zero).max_attempts(), 1);
    }

    #[test]
    fn test_timeout_settings_map_to_sdk() {
        let sdk = sdk_timeout_config(&TimeoutConfig {
            connect_ms: 1500,
            operation_ms: 60_000,
        });
        assert_eq!(sdk.connect_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(sdk.operation_timeout(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_new_rejects_incomplete_store_config() {
        let store = StoreConfig::default();
        let result = S3Store::new(&store, &RetryConfig::default(), &TimeoutConfig::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
