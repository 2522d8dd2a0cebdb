//! Publisher — stores a composed preview as PNG and hands back its public URL.
//!
//! Uploads go through the authenticated S3 endpoint; the returned link is always built
//! from the separate public base. Keys depend only on the identifier, so publishing the
//! same identifier twice overwrites one object and yields the same URL.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::info;

use crate::catalog::slugify;

pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const DEFAULT_PREFIX: &str = "previews";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("identifier '{0}' has no usable characters for a storage key")]
    InvalidIdentifier(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("encoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Minimal write interface of an S3-compatible bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), PublishError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), PublishError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| PublishError::Upload(format!("{e:?}")))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[derive(Clone)]
pub struct Publisher {
    store: Option<Arc<dyn ObjectStore>>,
    public_base: String,
    prefix: String,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, public_base: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            public_base: public_base.into().trim_end_matches('/').to_string(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// A publisher with no backing store; every publish fails with `NotConfigured`.
    pub fn unconfigured() -> Self {
        Self {
            store: None,
            public_base: String::new(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    /// `{prefix}/{slug}_grid.png`
    pub fn object_key(&self, identifier: &str) -> Result<String, PublishError> {
        let slug = slugify(identifier);
        if slug.is_empty() {
            return Err(PublishError::InvalidIdentifier(identifier.to_string()));
        }
        let file = format!("{slug}_grid.png");
        Ok(if self.prefix.is_empty() {
            file
        } else {
            format!("{}/{file}", self.prefix)
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }

    /// Encodes `image` as PNG, uploads it, and returns the public URL.
    pub async fn publish(&self, identifier: &str, image: RgbImage) -> Result<String, PublishError> {
        let store = self.store.as_ref().ok_or(PublishError::NotConfigured)?;
        let key = self.object_key(identifier)?;

        let png = tokio::task::spawn_blocking(move || encode_png(&image)).await??;
        store.put(&key, png, PNG_CONTENT_TYPE).await?;

        let url = self.public_url(&key);
        info!("Published preview for '{identifier}': {url}");
        Ok(url)
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Public r2.dev base for a bucket, derived from the account-scoped upload endpoint
/// (`https://<account>.r2.cloudflarestorage.com` → `https://<bucket>.<account>.r2.dev`).
pub fn derive_public_base(endpoint: &str, bucket: &str) -> Option<String> {
    let host = endpoint.split("//").last()?;
    let account = host.split(['.', '/', ':']).next().filter(|a| !a.is_empty())?;
    Some(format!("https://{bucket}.{account}.r2.dev"))
}
