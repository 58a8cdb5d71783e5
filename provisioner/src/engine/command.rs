//! Command contract

use async_trait::async_trait;

use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;

/// One atomic, revertible unit of provisioning work.
///
/// Commands are small value descriptors holding only the collaborators and
/// configuration they need; all run state lives in the context, which is
/// mutated by at most one command at a time.
#[async_trait]
pub trait ProvisionCommand: Send + Sync {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError>;

    /// Best-effort undo, invoked in reverse order after a later command in
    /// the same stage fails. Errors are logged by the orchestrator but never
    /// replace the original failure.
    async fn revert(&self, _ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        Ok(())
    }

    /// Static, human-readable cause category for failures of this command.
    fn error_message(&self) -> &'static str;

    /// Protocol status reported when this command fails.
    fn failure_status(&self) -> ProvisionStatus;
}
