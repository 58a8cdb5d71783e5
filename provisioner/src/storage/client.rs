//! HTTP storage bucket client

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::ProvisionError;
use crate::storage::ArtifactStore;

/// Thin HTTP adapter over one storage bucket.
pub struct BucketClient {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl BucketClient {
    pub fn new(base_url: &str, bucket: &str) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ArtifactStore for BucketClient {
    async fn upload(&self, local: &Path, key: &str) -> Result<(), ProvisionError> {
        let url = self.object_url(key);
        debug!("PUT {}", url);

        let body = tokio::fs::read(local).await?;
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::IF_NONE_MATCH, "*")
            .body(body)
            .send()
            .await?;

        // A previous run already cached this object; nothing to do.
        if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            debug!("object {} already exists", key);
            return Ok(());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::StorageError(format!(
                "upload of {key} failed: {status}: {body}"
            )));
        }

        Ok(())
    }

    async fn list(&self, prefix: &str, delimiter: &str) -> Result<Vec<String>, ProvisionError> {
        let url = format!("{}/{}", self.base_url, self.bucket);
        debug!("GET {} (prefix={})", url, prefix);

        let response = self
            .client
            .get(&url)
            .query(&[("prefix", prefix), ("delimiter", delimiter)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ProvisionError::StorageError(format!(
                "list of {prefix} failed: {status}"
            )));
        }

        let names = response.json().await?;
        Ok(names)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }
}
