//! Object storage for uploaded resumes.

use std::time::Duration;

use anyhow::{ensure, Context};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, presigning::PresigningConfig, Client};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;

use crate::config::StorageConfig;

/// S3 refuses presigned URLs that live longer than a week.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Store `body` under `key`, replacing any previous object.
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;

    /// Time-limited download URL for `key`.
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

fn presign_ttl(seconds: u64) -> anyhow::Result<PresigningConfig> {
    ensure!(
        (1..=MAX_PRESIGN_SECS).contains(&seconds),
        "presign ttl {}s out of range",
        seconds
    );
    PresigningConfig::expires_in(Duration::from_secs(seconds)).context("presign ttl")
}

/// Resume bucket on an S3-compatible endpoint (MinIO in development).
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        ensure!(!cfg.bucket.is_empty(), "STORAGE_BUCKET is empty");

        let creds = Credentials::new(
            &cfg.access_key,
            &cfg.secret_key,
            None,
            None,
            "storage-config",
        );
        let sdk = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        // Path-style addressing so bucket names need no DNS entry.
        let s3 = aws_sdk_s3::config::Builder::from(&sdk)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("upload resume {}", key))?;
        tracing::debug!(key, size, "resume stored");
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_ttl(seconds)?)
            .await
            .with_context(|| format!("presign resume {}", key))?;
        Ok(presigned.uri().to_string())
    }
}
