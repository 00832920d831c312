//! # Storage Bucket
//!
//! Key to bytes object store holding every image we serve.
//! ## Layout
//! - `local-cache/{type}-{millis}.{ext}`: copies of external images made by the sync function
//! - `placeholders/{name}.svg`: generated placeholders
//! - Anything else: uploaded by the admin back office
//!
//! ## REST
//! Supabase-style storage API.
//! - Download: `GET {base}/storage/v1/object/{bucket}/{key}`
//! - Upload: `POST {base}/storage/v1/object/{bucket}/{key}` with `x-upsert`
//! - Public URL: `{base}/storage/v1/object/public/{bucket}/{key}`
//!
//! Key segments are percent-encoded, so `a?b.jpg` is one object and never a query.
//!
//! Single attempt per call, bounded by the client timeout. No retries.
use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub key: String,
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    pub upsert: bool,
}

#[async_trait]
pub trait Bucket: Send + Sync {
    /// `None` when the key does not exist.
    async fn download(&self, key: &str) -> Result<Option<StorageObject>>;

    async fn upload(&self, key: &str, bytes: Bytes, options: UploadOptions) -> Result<()>;

    fn public_url(&self, key: &str) -> String;
}

pub struct RestBucket {
    client: Client,
    base_url: Url,
    bucket: String,
    service_key: String,
}

impl RestBucket {
    pub fn new(client: Client, base_url: &str, bucket: &str, service_key: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid storage url")?;
        if base_url.cannot_be_a_base() {
            bail!("storage url {base_url} cannot hold a path");
        }

        Ok(Self {
            client,
            base_url,
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> Url {
        self.url_for(&[], key)
    }

    fn url_for(&self, scope: &[&str], key: &str) -> Url {
        let mut url = self.base_url.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "object"])
                .extend(scope)
                .push(&self.bucket)
                .extend(key.split('/'));
        }

        url
    }
}

#[async_trait]
impl Bucket for RestBucket {
    async fn download(&self, key: &str) -> Result<Option<StorageObject>> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .context("storage download request failed")?;

        // storage answers 400 for unknown objects on some versions
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
        ) {
            return Ok(None);
        }

        if !response.status().is_success() {
            bail!("storage download returned {}", response.status());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await.context("storage download body")?;

        Ok(Some(StorageObject {
            key: key.to_string(),
            bytes,
            content_type,
        }))
    }

    async fn upload(&self, key: &str, bytes: Bytes, options: UploadOptions) -> Result<()> {
        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(CONTENT_TYPE, options.content_type)
            .header("x-upsert", options.upsert.to_string())
            .body(bytes)
            .send()
            .await
            .context("storage upload request failed")?;

        if !response.status().is_success() {
            bail!("storage upload returned {}", response.status());
        }

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        self.url_for(&["public"], key).into()
    }
}

/// In-process bucket for tests and local runs.
pub struct MemoryBucket {
    objects: RwLock<HashMap<String, StorageObject>>,
    public_base: String,
}

impl MemoryBucket {
    pub fn new(public_base: &str) -> Self {
        Self {
            objects: RwLock::default(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    async fn download(&self, key: &str) -> Result<Option<StorageObject>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn upload(&self, key: &str, bytes: Bytes, options: UploadOptions) -> Result<()> {
        let mut objects = self.objects.write().await;

        if !options.upsert && objects.contains_key(key) {
            bail!("object {key} already exists");
        }

        objects.insert(
            key.to_string(),
            StorageObject {
                key: key.to_string(),
                bytes,
                content_type: options.content_type,
            },
        );

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
