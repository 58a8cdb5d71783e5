//! Package install command

use async_trait::async_trait;
use tracing::info;

use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::service::context::ProvisionContext;

/// Installs each staged APK, then re-reads the installed version so the
/// response reflects what the device actually runs.
///
/// Tasks whose resolved version equals the installed version were never
/// staged and are skipped here.
pub struct InstallPackageCommand;

impl InstallPackageCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InstallPackageCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisionCommand for InstallPackageCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let dut = &ctx.dut;
        for task in ctx.packages.iter_mut() {
            let Some(device_path) = task
                .payload
                .as_ref()
                .and_then(|payload| payload.device_path.clone())
            else {
                continue;
            };

            // -r replaces an existing package, -d tolerates downgrades.
            dut.run_cmd(
                "adb",
                &["-s", &dut.serial_number, "install", "-r", "-d", &device_path],
            )
            .await?;
            info!("installed {}", device_path);

            if let Some(package) = task.android_package.as_mut() {
                let version_code = dut.installed_version_code(&package.package_name).await?;
                if version_code.is_empty() {
                    return Err(ProvisionError::InstallError(format!(
                        "{} not reported as installed after install",
                        package.package_name
                    )));
                }
                info!(
                    "package {} now at version_code {}",
                    package.package_name, version_code
                );
                package.updated_version_code = version_code;
            }
        }
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to install package"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::ProvisioningFailed
    }
}
