//! OS flash command

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::response::ProvisionStatus;
use crate::remote::poll::{wait_for_bootloader_mode, wait_for_normal_mode};
use crate::service::context::{DutConnection, ProvisionContext, ResolvedImage};

/// Flashes the staged OS build.
///
/// Firmware partitions go first, each followed by a reboot back into
/// bootloader mode; the update archive then rewrites the remaining partitions
/// while preserving user data. The device is polled back to normal mode with
/// the longer post-flash budget before the new build info is recorded.
pub struct FlashOsCommand {
    config: Arc<ProvisionConfig>,
}

impl FlashOsCommand {
    pub fn new(config: Arc<ProvisionConfig>) -> Self {
        Self { config }
    }

    async fn flash_partition(
        &self,
        dut: &DutConnection,
        image: &ResolvedImage,
        partition: &str,
    ) -> Result<(), ProvisionError> {
        let device_dir = staged_dir(image)?;
        let file = find_partition_image(&image.files, partition).ok_or_else(|| {
            ProvisionError::FlashError(format!("cannot find {partition:?} image"))
        })?;
        let path = format!("{}/{}", device_dir, file);
        info!("flashing {} from {}", partition, path);
        dut.run_cmd(
            "fastboot",
            &["-s", &dut.serial_number, "flash", partition, &path],
        )
        .await?;
        Ok(())
    }

    async fn flash_all(
        &self,
        dut: &DutConnection,
        image: &ResolvedImage,
    ) -> Result<(), ProvisionError> {
        let device_dir = staged_dir(image)?;
        let file = find_update_archive(&image.files).ok_or_else(|| {
            ProvisionError::FlashError("cannot find update zip file".to_string())
        })?;
        let path = format!("{}/{}", device_dir, file);

        // fastboot fails if TMPDIR does not point at writable persistent
        // storage; the default tmpfs lacks the capacity.
        let tmp_dir = format!("{}/tmp", device_dir);
        dut.create_directories(&[&tmp_dir]).await?;
        let tool = format!("TMPDIR={} fastboot", tmp_dir);
        info!("flashing update archive {}", path);
        dut.run_cmd(&tool, &["-s", &dut.serial_number, "update", &path])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProvisionCommand for FlashOsCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let Some(image) = ctx.os.resolved.clone() else {
            info!("no OS image staged, skipping flash");
            return Ok(());
        };
        let dut = &ctx.dut;
        let poll = &self.config.poll;

        // Drop into bootloader mode for the firmware partitions.
        dut.reboot_to_bootloader("adb").await?;
        wait_for_bootloader_mode(dut, &poll.bootloader, tokio::time::sleep).await?;

        for partition in ["bootloader", "radio"] {
            self.flash_partition(dut, &image, partition).await?;
            dut.reboot_to_bootloader("fastboot").await?;
            wait_for_bootloader_mode(dut, &poll.bootloader, tokio::time::sleep).await?;
        }

        self.flash_all(dut, &image).await?;

        // Device takes a while to boot after a full flash.
        wait_for_normal_mode(dut, &poll.post_flash, tokio::time::sleep).await?;

        let build_info = dut.os_build_info().await?;
        info!(
            "flashed build: id={} os={} incremental={}",
            build_info.id, build_info.os_version, build_info.incremental_version
        );
        ctx.os.updated_build_info = Some(build_info);
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to flash Android OS"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::ProvisioningFailed
    }
}

fn staged_dir(image: &ResolvedImage) -> Result<&str, ProvisionError> {
    image.device_dir.as_deref().ok_or_else(|| {
        ProvisionError::FlashError("OS image files were not staged on the device".to_string())
    })
}

/// Find a partition image by its `<partition>[-.]*img` naming pattern.
fn find_partition_image<'a>(files: &'a [String], partition: &str) -> Option<&'a str> {
    files.iter().map(String::as_str).find(|file| {
        let base = Path::new(file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file);
        match base.strip_prefix(partition) {
            Some(rest) => {
                (rest.starts_with('-') || rest.starts_with('.')) && rest.ends_with("img")
            }
            None => false,
        }
    })
}

fn find_update_archive(files: &[String]) -> Option<&str> {
    files
        .iter()
        .map(String::as_str)
        .find(|file| file.ends_with(".zip"))
}
