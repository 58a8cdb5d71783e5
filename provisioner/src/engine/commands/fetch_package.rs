//! Package fetch command

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::registry::PackageRegistry;
use crate::service::context::ProvisionContext;

/// Downloads each resolved package archive into the workspace.
///
/// A task whose resolved version code equals the installed version is a no-op.
/// The download destination is keyed by instance id, so a rerun in the same
/// workspace reuses a completed download instead of transferring again.
pub struct FetchPackageCommand {
    registry: Arc<dyn PackageRegistry>,
}

impl FetchPackageCommand {
    pub fn new(registry: Arc<dyn PackageRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ProvisionCommand for FetchPackageCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let workspace = &ctx.workspace;
        for task in ctx.packages.iter_mut() {
            let Some(resolved) = task.resolved.as_mut() else {
                continue;
            };

            if let Some(package) = &task.android_package {
                if !package.version_code.is_empty()
                    && package.version_code == resolved.version_code
                {
                    info!(
                        "package {} already at version_code {}, skipping fetch",
                        package.package_name, package.version_code
                    );
                    continue;
                }
            }

            let dest = workspace.archive_file(&resolved.instance_id);
            if dest.exists().await {
                debug!(
                    "archive for instance {} already present, reusing",
                    resolved.instance_id
                );
                resolved.archive_path = Some(dest.path().to_path_buf());
                continue;
            }

            self.registry
                .fetch_instance_to(&resolved.registry_name, &resolved.instance_id, dest.path())
                .await?;
            info!(
                "fetched {} instance {} to {:?}",
                resolved.registry_name,
                resolved.instance_id,
                dest.path()
            );
            resolved.archive_path = Some(dest.path().to_path_buf());
        }
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to fetch package from registry"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::RegistryFetchFailed
    }
}
