//! Provisioning state machine
//!
//! A one-shot convergence pipeline: stages advance in a fixed order, no stage
//! is ever revisited, and the first stage failure halts the run with a
//! classified status.

use std::sync::Arc;

use tracing::info;

use crate::config::ProvisionConfig;
use crate::engine::command::ProvisionCommand;
use crate::engine::commands::{
    CleanupCommand, CopyDataCommand, ExtractPackageCommand, FetchDeviceInfoCommand,
    FetchPackageCommand, FlashOsCommand, InstallPackageCommand, ResolveOsTargetCommand,
    ResolvePackageCommand, RestartAppCommand, UploadPayloadCommand,
};
use crate::engine::orchestrator::{run_stage, StageFailure};
use crate::registry::PackageRegistry;
use crate::service::context::ProvisionContext;
use crate::storage::ArtifactStore;

/// Provisioning stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Fetch,
    Install,
    PostInstall,
    Cleanup,
}

impl Stage {
    /// The entry stage.
    pub const FIRST: Stage = Stage::Resolve;

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Install => "install",
            Stage::PostInstall => "post-install",
            Stage::Cleanup => "cleanup",
        }
    }

    /// The following stage; `None` marks the terminal stage.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Resolve => Some(Stage::Fetch),
            Stage::Fetch => Some(Stage::Install),
            Stage::Install => Some(Stage::PostInstall),
            Stage::PostInstall => Some(Stage::Cleanup),
            Stage::Cleanup => None,
        }
    }
}

/// The provisioning engine: collaborators plus configuration, shared by the
/// commands of every stage.
pub struct Engine {
    registry: Arc<dyn PackageRegistry>,
    image_store: Arc<dyn ArtifactStore>,
    package_store: Arc<dyn ArtifactStore>,
    config: Arc<ProvisionConfig>,
}

impl Engine {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        image_store: Arc<dyn ArtifactStore>,
        package_store: Arc<dyn ArtifactStore>,
        config: Arc<ProvisionConfig>,
    ) -> Self {
        Self {
            registry,
            image_store,
            package_store,
            config,
        }
    }

    fn stage_commands(&self, stage: Stage) -> Vec<Box<dyn ProvisionCommand>> {
        match stage {
            Stage::Resolve => vec![
                Box::new(FetchDeviceInfoCommand::new(self.config.clone())),
                Box::new(ResolveOsTargetCommand::new()),
                Box::new(ResolvePackageCommand::new(
                    self.registry.clone(),
                    self.config.clone(),
                )),
            ],
            Stage::Fetch => vec![
                Box::new(FetchPackageCommand::new(self.registry.clone())),
                Box::new(ExtractPackageCommand::new()),
                Box::new(UploadPayloadCommand::new(
                    self.package_store.clone(),
                    self.config.clone(),
                )),
                Box::new(CopyDataCommand::packages(self.package_store.clone())),
                Box::new(CopyDataCommand::os_images(
                    self.image_store.clone(),
                    self.config.clone(),
                )),
            ],
            Stage::Install => vec![
                Box::new(FlashOsCommand::new(self.config.clone())),
                Box::new(InstallPackageCommand::new()),
            ],
            Stage::PostInstall => vec![Box::new(RestartAppCommand::new())],
            Stage::Cleanup => vec![Box::new(CleanupCommand::new())],
        }
    }

    /// Drive the context through every stage.
    ///
    /// On failure the run halts, staging state is cleaned up best-effort, and
    /// the classified stage failure is returned; the context keeps whatever
    /// partial version info it established for the response snapshot.
    pub async fn run(&self, ctx: &mut ProvisionContext) -> Result<(), StageFailure> {
        let mut stage = Some(Stage::FIRST);
        while let Some(current) = stage {
            info!(stage = current.name(), "entering stage");
            let commands = self.stage_commands(current);
            if let Err(failure) = run_stage(current.name(), &commands, ctx).await {
                ctx.cleanup_staging().await;
                return Err(failure);
            }
            stage = current.next();
        }
        Ok(())
    }
}
