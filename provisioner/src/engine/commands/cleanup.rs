//! Cleanup command

use async_trait::async_trait;

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;

/// Removes the local workspace and the on-device staging directories.
///
/// Deliberately best-effort: deletion errors are logged, never escalated.
pub struct CleanupCommand;

impl CleanupCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CleanupCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisionCommand for CleanupCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        ctx.cleanup_staging().await;
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to clean up provisioning artifacts"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::PostProvisionSetupFailed
    }
}
