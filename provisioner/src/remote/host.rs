//! Host-local remote executor
//!
//! Production adapter for the case where the agent runs directly on the
//! device's associated host: tools are spawned through the shell (the
//! argument lists routinely carry pipelines), and object copies stream over
//! HTTP from the storage service.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ProvisionError;
use crate::remote::RemoteExecutor;

/// Executor backed by the local shell and an HTTP client.
pub struct HostExecutor {
    http: reqwest::Client,
}

impl HostExecutor {
    pub fn new() -> Result<Self, ProvisionError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RemoteExecutor for HostExecutor {
    async fn run_cmd(&self, cmd: &str, args: &[&str]) -> Result<String, ProvisionError> {
        let command_line = format!("{} {}", cmd, args.join(" "));
        debug!("run_cmd: {}", command_line);

        let output = Command::new("sh")
            .args(["-c", &command_line])
            .output()
            .await
            .map_err(|e| ProvisionError::RemoteError(format!("failed to spawn {cmd}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::RemoteError(format!(
                "{} exited with {}: {}",
                cmd,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn copy_data(&self, source_url: &str, dst_path: &str) -> Result<(), ProvisionError> {
        debug!("copy_data: {} -> {}", source_url, dst_path);

        if let Some(parent) = Path::new(dst_path).parent() {
            fs::create_dir_all(parent).await?;
        }

        let response = self.http.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(ProvisionError::StorageError(format!(
                "download of {} failed: {}",
                source_url,
                response.status()
            )));
        }

        let mut file = fs::File::create(dst_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.sync_all().await?;
        Ok(())
    }

    async fn create_directories(&self, dirs: &[&str]) -> Result<(), ProvisionError> {
        for dir in dirs {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    async fn delete_directory(&self, dir: &str) -> Result<(), ProvisionError> {
        match fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
