//! App restart command

use async_trait::async_trait;
use tracing::{debug, info};

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;

/// Force-stops the Android package of every task after an update, so the next
/// launch picks up the installed version.
///
/// When any task changed, every task participates: a same-version no-op
/// package may still depend on the one that moved.
pub struct RestartAppCommand;

impl RestartAppCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RestartAppCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisionCommand for RestartAppCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        if !ctx.packages_changed() {
            debug!("no package changed, skipping app restart");
            return Ok(());
        }

        let dut = &ctx.dut;
        for task in &ctx.packages {
            let Some(package) = task.android_package.as_ref() else {
                continue;
            };
            dut.run_cmd(
                "adb",
                &[
                    "-s",
                    &dut.serial_number,
                    "shell",
                    "am",
                    "force-stop",
                    &package.package_name,
                ],
            )
            .await?;
            info!("restarted {}", package.package_name);
        }
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to restart application"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::PostProvisionSetupFailed
    }
}
