//! Package extraction command

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;

/// Unzips each fetched archive into a per-instance payload directory.
///
/// Extraction is skipped when the destination directory already exists, so a
/// run restarted over the same workspace unzips each instance exactly once.
pub struct ExtractPackageCommand;

impl ExtractPackageCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractPackageCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisionCommand for ExtractPackageCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let workspace = &ctx.workspace;
        for task in ctx.packages.iter() {
            let Some(resolved) = task.resolved.as_ref() else {
                continue;
            };
            let Some(archive_path) = resolved.archive_path.as_deref() else {
                continue;
            };

            let dest = workspace.payload_dir(&resolved.instance_id);
            if dest.exists().await {
                debug!(
                    "payload dir for instance {} already present, skipping extraction",
                    resolved.instance_id
                );
                continue;
            }

            unzip(archive_path, dest.path()).await?;
            info!(
                "extracted instance {} to {:?}",
                resolved.instance_id,
                dest.path()
            );
        }
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to extract package archive"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::PreProvisionSetupFailed
    }
}

async fn unzip(archive: &Path, dest: &Path) -> Result<(), ProvisionError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), ProvisionError> {
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        zip.extract(&dest)?;
        Ok(())
    })
    .await
    .map_err(|e| ProvisionError::Internal(e.to_string()))?
}
