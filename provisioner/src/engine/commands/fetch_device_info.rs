//! Device info command

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::request::PackageKind;
use crate::models::response::ProvisionStatus;
use crate::service::context::{AndroidPackage, ProvisionContext};

/// Reads the device board, the current OS build info, and the installed
/// version of every requested package. This is the first touch of the device
/// in a run; a failure here means the DUT was unreachable before provisioning
/// modified anything.
pub struct FetchDeviceInfoCommand {
    config: Arc<ProvisionConfig>,
}

impl FetchDeviceInfoCommand {
    pub fn new(config: Arc<ProvisionConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProvisionCommand for FetchDeviceInfoCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let board = ctx.dut.getprop("ro.product.board").await?;
        info!("device board: {}", board);
        ctx.dut.board = Some(board);

        let build_info = ctx.dut.os_build_info().await?;
        info!(
            "device build: id={} os={} incremental={}",
            build_info.id, build_info.os_version, build_info.incremental_version
        );
        ctx.os.build_info = Some(build_info);

        let dut = &ctx.dut;
        for task in ctx.packages.iter_mut() {
            let package_name = match task.spec.kind {
                Some(PackageKind::CoreService) => self.config.core_service_package.clone(),
                // No known on-device identity; install decisions fall back to
                // the registry version alone.
                None => continue,
            };
            let version_code = dut.installed_version_code(&package_name).await?;
            info!(
                "installed package {}: version_code={:?}",
                package_name, version_code
            );
            task.android_package = Some(AndroidPackage {
                package_name,
                version_code,
                updated_version_code: String::new(),
            });
        }

        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to read device info"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::DutUnreachablePreProvision
    }
}
