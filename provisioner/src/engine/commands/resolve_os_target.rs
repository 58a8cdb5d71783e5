//! OS target resolution command

use async_trait::async_trait;
use tracing::info;

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::request::OsImageSource;
use crate::models::response::ProvisionStatus;
use crate::service::context::{ProvisionContext, ResolvedImage};

/// Resolves the requested OS image source to a concrete build, and clears the
/// flash target when the device already runs that build.
pub struct ResolveOsTargetCommand;

impl ResolveOsTargetCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResolveOsTargetCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisionCommand for ResolveOsTargetCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let Some(source) = ctx.os.source.take() else {
            return Ok(());
        };

        let (build_id, storage_folder) = match source {
            OsImageSource::StoragePath(path) => {
                let folder = path.folder.trim_matches('/').to_string();
                let build_id = folder
                    .rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .ok_or_else(|| {
                        ProvisionError::SpecError(format!("empty image folder: {:?}", folder))
                    })?
                    .to_string();
                (build_id, folder)
            }
            OsImageSource::BuildMap(map) => {
                let board = ctx.dut.board.as_deref().ok_or_else(|| {
                    ProvisionError::SpecError("device board has not been read".to_string())
                })?;
                let build_id = map.get(board).cloned().ok_or_else(|| {
                    ProvisionError::SpecError(format!("no build mapped for board {board:?}"))
                })?;
                let folder = format!("{}/{}", board, build_id);
                (build_id, folder)
            }
        };

        let current_id = ctx.os.build_info.as_ref().map(|info| info.id.as_str());
        if current_id == Some(build_id.as_str()) {
            info!("device already on build {}, no OS flash required", build_id);
            return Ok(());
        }

        info!(
            "flash target: build {} from folder {}",
            build_id, storage_folder
        );
        ctx.os.resolved = Some(ResolvedImage {
            build_id,
            storage_folder,
            files: Vec::new(),
            device_dir: None,
        });
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to resolve OS image target"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::InvalidRequest
    }
}
