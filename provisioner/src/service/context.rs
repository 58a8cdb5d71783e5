//! Provisioning context
//!
//! The unit of work for one provisioning run. Owned by exactly one run and
//! mutated only by the command currently executing; callers must serialize
//! runs per device.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::errors::ProvisionError;
use crate::models::request::{OsImageSource, PackageSpec, ProvisionRequest};
use crate::models::response::{InstalledPackage, OsBuildInfo};
use crate::remote::RemoteExecutor;
use crate::service::workspace::Workspace;
use crate::utils::parse_version_code;

/// Shared state for one provisioning run.
pub struct ProvisionContext {
    pub dut: DutConnection,
    pub os: AndroidOs,
    pub packages: Vec<PackageTask>,
    pub workspace: Workspace,
}

/// Connection to one DUT through its associated host.
pub struct DutConnection {
    /// Stable device identifier
    pub serial_number: String,

    /// Hardware family, read once per run by the device-info command
    pub board: Option<String>,

    /// Remote execution collaborator for this device
    pub host: Arc<dyn RemoteExecutor>,

    /// Run-scoped cancellation signal
    pub cancel: CancelToken,
}

impl DutConnection {
    /// Run a device tool, observing cancellation.
    pub async fn run_cmd(&self, cmd: &str, args: &[&str]) -> Result<String, ProvisionError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            result = self.host.run_cmd(cmd, args) => result,
        }
    }

    /// Copy a storage object onto the associated host, observing cancellation.
    pub async fn copy_data(&self, source_url: &str, dst_path: &str) -> Result<(), ProvisionError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            result = self.host.copy_data(source_url, dst_path) => result,
        }
    }

    /// Create directories on the associated host, observing cancellation.
    pub async fn create_directories(&self, dirs: &[&str]) -> Result<(), ProvisionError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            result = self.host.create_directories(dirs) => result,
        }
    }

    /// Read a system property through adb.
    pub async fn getprop(&self, prop: &str) -> Result<String, ProvisionError> {
        let output = self
            .run_cmd("adb", &["-s", &self.serial_number, "shell", "getprop", prop])
            .await?;
        Ok(output.trim().to_string())
    }

    /// Read the full OS build info from the device.
    pub async fn os_build_info(&self) -> Result<OsBuildInfo, ProvisionError> {
        let id = self.getprop("ro.build.id").await?;
        let os_version = self.getprop("ro.build.version.release").await?;
        let incremental_version = self.getprop("ro.build.version.incremental").await?;
        Ok(OsBuildInfo {
            id,
            os_version,
            incremental_version,
        })
    }

    /// Read the installed version code of an Android package.
    ///
    /// Returns an empty string when the package is not installed.
    pub async fn installed_version_code(&self, package: &str) -> Result<String, ProvisionError> {
        let args = [
            "-s",
            self.serial_number.as_str(),
            "shell",
            "dumpsys",
            "package",
            package,
            "|",
            "grep",
            "versionCode",
            "|",
            "sort",
            "-r",
            "|",
            "head",
            "-n",
            "1",
        ];
        let output = self.run_cmd("adb", &args).await?;
        Ok(parse_version_code(&output).unwrap_or_default())
    }

    /// Reboot the device into bootloader mode through the given tool
    /// (`adb` from normal mode, `fastboot` when already in bootloader mode).
    pub async fn reboot_to_bootloader(&self, tool: &str) -> Result<(), ProvisionError> {
        self.run_cmd(tool, &["-s", &self.serial_number, "reboot", "bootloader"])
            .await?;
        Ok(())
    }
}

/// Android OS state for this run.
#[derive(Debug, Default)]
pub struct AndroidOs {
    /// Requested image source; consumed by target resolution
    pub source: Option<OsImageSource>,

    /// Resolved flash target. Stays `None` when no flash is required,
    /// including when the device is already on the target build.
    pub resolved: Option<ResolvedImage>,

    /// Build info read before provisioning
    pub build_info: Option<OsBuildInfo>,

    /// Build info re-read after a flash
    pub updated_build_info: Option<OsBuildInfo>,
}

/// A resolved, stageable OS image build.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// Target build id
    pub build_id: String,

    /// Build folder relative to the image bucket
    pub storage_folder: String,

    /// Image/archive file names, filled by the staging copy
    pub files: Vec<String>,

    /// On-device staging directory, filled by the staging copy
    pub device_dir: Option<String>,
}

/// One requested package flowing through the stages.
#[derive(Debug, Clone)]
pub struct PackageTask {
    pub spec: PackageSpec,

    /// Pinned registry instance, set by the resolve stage
    pub resolved: Option<ResolvedPackage>,

    /// On-device package identity and versions
    pub android_package: Option<AndroidPackage>,

    /// Extracted payload locations
    pub payload: Option<PayloadFile>,
}

/// Concrete registry package pin.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub registry_name: String,
    pub instance_id: String,

    /// Declared version-code tag value
    pub version_code: String,

    /// Local archive path once fetched
    pub archive_path: Option<PathBuf>,
}

/// Android package identity on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AndroidPackage {
    pub package_name: String,

    /// Version installed at the start of the run; empty when absent
    pub version_code: String,

    /// Version established by this run; empty when untouched
    pub updated_version_code: String,
}

/// Extracted APK payload locations.
#[derive(Debug, Clone)]
pub struct PayloadFile {
    /// Payload file name
    pub name: String,

    /// Cache key in the package bucket once uploaded
    pub storage_key: Option<String>,

    /// Path on the associated host once copied
    pub device_path: Option<String>,
}

impl ProvisionContext {
    /// Build a run context from an incoming request.
    pub fn new(
        request: ProvisionRequest,
        host: Arc<dyn RemoteExecutor>,
        cancel: CancelToken,
        workspace: Workspace,
    ) -> Self {
        let packages = request
            .packages
            .into_iter()
            .map(|spec| PackageTask {
                spec,
                resolved: None,
                android_package: None,
                payload: None,
            })
            .collect();

        Self {
            dut: DutConnection {
                serial_number: request.device.serial_number,
                board: None,
                host,
                cancel,
            },
            os: AndroidOs {
                source: request.os_image,
                ..AndroidOs::default()
            },
            packages,
            workspace,
        }
    }

    /// Whether any package version changed during this run.
    pub fn packages_changed(&self) -> bool {
        self.packages.iter().any(|task| {
            task.android_package
                .as_ref()
                .is_some_and(|pkg| !pkg.updated_version_code.is_empty())
        })
    }

    /// Packages actually updated, for the response.
    pub fn updated_packages(&self) -> Vec<InstalledPackage> {
        self.packages
            .iter()
            .filter_map(|task| task.android_package.as_ref())
            .filter(|pkg| !pkg.updated_version_code.is_empty())
            .map(|pkg| InstalledPackage {
                name: pkg.package_name.clone(),
                version_code: pkg.updated_version_code.clone(),
            })
            .collect()
    }

    /// Best-effort build info for the response: updated when flashed,
    /// otherwise whatever was read before the failure.
    pub fn build_snapshot(&self) -> Option<OsBuildInfo> {
        self.os
            .updated_build_info
            .clone()
            .or_else(|| self.os.build_info.clone())
    }

    /// Remove the local workspace and on-device staging directories.
    ///
    /// Deliberately relaxed: every error is logged and swallowed so that a
    /// cleanup problem never decides the fate of a run.
    pub async fn cleanup_staging(&self) {
        if let Err(e) = self.workspace.remove().await {
            warn!("failed to remove workspace: {}", e);
        }

        if let Some(device_dir) = self
            .os
            .resolved
            .as_ref()
            .and_then(|image| image.device_dir.as_deref())
        {
            if let Err(e) = self.dut.host.delete_directory(device_dir).await {
                warn!("failed to remove device image dir {}: {}", device_dir, e);
            }
        }

        for task in &self.packages {
            let Some(device_path) = task
                .payload
                .as_ref()
                .and_then(|payload| payload.device_path.as_deref())
            else {
                continue;
            };
            if let Some(parent) = std::path::Path::new(device_path).parent() {
                let dir = parent.to_string_lossy();
                if let Err(e) = self.dut.host.delete_directory(&dir).await {
                    warn!("failed to remove device package dir {}: {}", dir, e);
                }
            }
        }
    }
}
