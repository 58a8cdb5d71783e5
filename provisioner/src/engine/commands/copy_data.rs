//! Data staging command

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;
use crate::storage::ArtifactStore;

/// Number of artifacts a complete image build stages: two partition images
/// plus one update archive.
const EXPECTED_IMAGE_FILES: usize = 3;

/// What a [`CopyDataCommand`] stages. An explicit constructor parameter, so
/// the command's behavior is fixed at stage-assembly time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedData {
    Packages,
    OsImages,
}

/// Copies staged artifacts from storage onto the device's associated host.
pub struct CopyDataCommand {
    data: StagedData,
    store: Arc<dyn ArtifactStore>,
    config: Option<Arc<ProvisionConfig>>,
}

impl CopyDataCommand {
    /// Stage cached package payloads under `/tmp/<instance-id>/`.
    pub fn packages(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            data: StagedData::Packages,
            store,
            config: None,
        }
    }

    /// Stage the OS image build onto writable persistent storage.
    pub fn os_images(store: Arc<dyn ArtifactStore>, config: Arc<ProvisionConfig>) -> Self {
        Self {
            data: StagedData::OsImages,
            store,
            config: Some(config),
        }
    }

    async fn copy_packages(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let dut = &ctx.dut;
        for task in ctx.packages.iter_mut() {
            let Some(instance_id) = task.resolved.as_ref().map(|r| r.instance_id.clone()) else {
                continue;
            };
            let Some(payload) = task.payload.as_mut() else {
                continue;
            };
            let Some(storage_key) = payload.storage_key.clone() else {
                continue;
            };

            let url = self.store.object_url(&storage_key);
            let dst = format!("/tmp/{}/{}", instance_id, payload.name);
            dut.copy_data(&url, &dst).await?;
            info!("staged payload {} at {}", payload.name, dst);
            payload.device_path = Some(dst);
        }
        Ok(())
    }

    async fn copy_os_images(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let dut = &ctx.dut;
        let Some(resolved) = ctx.os.resolved.as_mut() else {
            // No OS flash requested or required.
            return Ok(());
        };
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ProvisionError::Internal("os_images copy lacks config".to_string()))?;

        let listing = self
            .store
            .list(&format!("{}/", resolved.storage_folder), "/")
            .await?;
        let files = provision_files(&listing);
        if files.len() != EXPECTED_IMAGE_FILES {
            return Err(ProvisionError::StorageError(format!(
                "missing provision files under {}: found {:?}",
                resolved.storage_folder, files
            )));
        }

        let device_dir = format!("{}/{}", config.device_image_dir, resolved.storage_folder);

        // The only concurrency point of a run: one transfer per staged file,
        // first error cancels the rest.
        let transfers: Vec<_> = files
            .iter()
            .map(|file| {
                let url = self
                    .store
                    .object_url(&format!("{}/{}", resolved.storage_folder, file));
                let dst = format!("{}/{}", device_dir, file);
                async move { dut.copy_data(&url, &dst).await }
            })
            .collect();
        futures::future::try_join_all(transfers).await?;

        info!("staged OS image files {:?} under {}", files, device_dir);
        resolved.files = files;
        resolved.device_dir = Some(device_dir);
        Ok(())
    }
}

#[async_trait]
impl ProvisionCommand for CopyDataCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        match self.data {
            StagedData::Packages => self.copy_packages(ctx).await,
            StagedData::OsImages => self.copy_os_images(ctx).await,
        }
    }

    fn error_message(&self) -> &'static str {
        "failed to copy data to device host"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::StorageDownloadFailed
    }
}

/// Filter a build folder listing down to the artifacts a flash needs.
fn provision_files(listing: &[String]) -> Vec<String> {
    let mut files = Vec::new();
    for name in listing {
        if files.len() == EXPECTED_IMAGE_FILES {
            break;
        }
        if name == "radio.img" || name == "bootloader.img" || name.ends_with(".zip") {
            files.push(name.clone());
        }
    }
    files
}
