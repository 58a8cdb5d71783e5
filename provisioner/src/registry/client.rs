//! HTTP registry client

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::ProvisionError;
use crate::registry::{PackageDescription, PackageRegistry};

/// Thin HTTP adapter over the registry service.
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PackageRegistry for RegistryClient {
    async fn describe(
        &self,
        name: &str,
        version: &str,
    ) -> Result<PackageDescription, ProvisionError> {
        let url = format!("{}/instances/describe", self.base_url);
        debug!("GET {} ({}@{})", url, name, version);

        let response = self
            .client
            .get(&url)
            .query(&[("package", name), ("version", version)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::RegistryError(format!(
                "describe of {name}@{version} failed: {status}: {body}"
            )));
        }

        let description = response.json().await?;
        Ok(description)
    }

    async fn fetch_instance_to(
        &self,
        package_name: &str,
        instance_id: &str,
        dest: &Path,
    ) -> Result<(), ProvisionError> {
        let url = format!("{}/instances/fetch", self.base_url);
        debug!("GET {} ({}/{})", url, package_name, instance_id);

        let response = self
            .client
            .get(&url)
            .query(&[("package", package_name), ("instance_id", instance_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ProvisionError::RegistryError(format!(
                "fetch of {package_name}/{instance_id} failed: {status}"
            )));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.sync_all().await?;
        Ok(())
    }
}
