//! Stage orchestration with reverse-order rollback

use tracing::{error, info, warn};

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;

/// A classified stage failure.
#[derive(Debug)]
pub struct StageFailure {
    pub status: ProvisionStatus,
    pub message: String,
    pub source: ProvisionError,
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.status, self.message)
    }
}

/// Execute a stage's commands in order.
///
/// On the first failure, every previously-executed command is reverted in
/// strict reverse order before the classified failure is reported. Revert
/// errors are logged, never suppressed, and never mask the original failure.
pub async fn run_stage(
    stage_name: &str,
    commands: &[Box<dyn ProvisionCommand>],
    ctx: &mut ProvisionContext,
) -> Result<(), StageFailure> {
    for (index, command) in commands.iter().enumerate() {
        match command.execute(ctx).await {
            Ok(()) => {}
            Err(err) => {
                error!(
                    stage = stage_name,
                    command = index,
                    "command failed: {}",
                    err
                );
                rollback(stage_name, &commands[..index], ctx).await;
                return Err(StageFailure {
                    status: command.failure_status(),
                    message: format!("{}: {}", command.error_message(), err),
                    source: err,
                });
            }
        }
    }
    info!(stage = stage_name, "stage complete");
    Ok(())
}

async fn rollback(
    stage_name: &str,
    executed: &[Box<dyn ProvisionCommand>],
    ctx: &mut ProvisionContext,
) {
    for (index, command) in executed.iter().enumerate().rev() {
        if let Err(err) = command.revert(ctx).await {
            warn!(
                stage = stage_name,
                command = index,
                "revert failed, original failure stands: {}",
                err
            );
        }
    }
}
