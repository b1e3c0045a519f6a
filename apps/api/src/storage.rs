use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Access denied to object: {0}")]
    AccessDenied(String),

    #[error("Storage error for {key}: {message}")]
    Other { key: String, message: String },
}

/// Read-only access to applicant documents in object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Bytes, StorageError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    return StorageError::NotFound(key.to_string());
                }
                match err.code() {
                    Some("AccessDenied") => StorageError::AccessDenied(key.to_string()),
                    code => StorageError::Other {
                        key: key.to_string(),
                        message: format!(
                            "{} - {}",
                            code.unwrap_or("unknown"),
                            err.message().unwrap_or("no message")
                        ),
                    },
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Other {
                key: key.to_string(),
                message: format!("Failed to read object body: {e}"),
            })?
            .into_bytes();

        info!("Downloaded s3://{}/{} ({} bytes)", self.bucket, key, bytes.len());
        Ok(bytes)
    }
}
