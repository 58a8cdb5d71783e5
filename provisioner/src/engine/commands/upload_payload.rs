//! Payload upload command

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::request::{
    ApkBuildPurpose, ApkDensity, PackageKind, PackageSpec,
};
use crate::models::response::ProvisionStatus;
use crate::service::context::{PayloadFile, ProvisionContext};
use crate::storage::ArtifactStore;

/// Locates each extracted APK payload and caches it in the package bucket
/// under `<instance-id>/<payload-name>`.
///
/// The store treats an already-cached object as success, so concurrent or
/// repeated runs over the same instance never fail each other here.
pub struct UploadPayloadCommand {
    store: Arc<dyn ArtifactStore>,
    config: Arc<ProvisionConfig>,
}

impl UploadPayloadCommand {
    pub fn new(store: Arc<dyn ArtifactStore>, config: Arc<ProvisionConfig>) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl ProvisionCommand for UploadPayloadCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let workspace = &ctx.workspace;
        let os_version = ctx
            .os
            .build_info
            .as_ref()
            .map(|info| info.os_version.clone())
            .unwrap_or_default();

        for task in ctx.packages.iter_mut() {
            let Some(resolved) = task.resolved.as_ref() else {
                continue;
            };

            let payload_dir = workspace.payload_dir(&resolved.instance_id);
            if !payload_dir.exists().await {
                // Same-version no-op task: nothing was fetched or extracted.
                continue;
            }

            let apk_name = match payload_name(&task.spec, &os_version, &self.config)? {
                Some(name) => name,
                None => single_apk_name(&payload_dir).await?,
            };

            let apk_file = payload_dir.file(&apk_name);
            if !apk_file.exists().await {
                return Err(ProvisionError::StorageError(format!(
                    "payload file missing from package: {apk_name}"
                )));
            }

            let key = format!("{}/{}", resolved.instance_id, apk_name);
            self.store.upload(apk_file.path(), &key).await?;
            info!("cached payload {} at {}", apk_name, key);

            task.payload = Some(PayloadFile {
                name: apk_name,
                storage_key: Some(key),
                device_path: None,
            });
        }
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to cache package payload"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::StorageUploadFailed
    }
}

/// Payload file name by naming convention, or `None` when the spec carries no
/// semantic kind and the payload must be discovered by scanning.
fn payload_name(
    spec: &PackageSpec,
    os_version: &str,
    config: &ProvisionConfig,
) -> Result<Option<String>, ProvisionError> {
    let Some(kind) = spec.kind else {
        return Ok(None);
    };

    match kind {
        PackageKind::CoreService => {
            let apk = spec.apk.as_ref();
            let architecture = apk.and_then(|a| a.architecture);
            let build_type = apk.and_then(|a| a.build_type);

            // Fully-specified attributes name the payload directly.
            if let (Some(architecture), Some(build_type)) = (architecture, build_type) {
                let density = apk
                    .and_then(|a| a.density)
                    .unwrap_or(ApkDensity::Alldpi)
                    .token();
                let purpose = apk
                    .and_then(|a| a.build_purpose)
                    .unwrap_or(ApkBuildPurpose::Release)
                    .token();
                return Ok(Some(format!(
                    "coresvc_{}_{}_{}_{}.apk",
                    build_type.token(),
                    architecture.token(),
                    density,
                    purpose
                )));
            }

            // Otherwise fall back to the platform resolved from the OS version.
            let platform = config.platform_map.get(os_version).ok_or_else(|| {
                ProvisionError::ConfigError(format!(
                    "missing core-service platform for Android OS v.{os_version}"
                ))
            })?;
            let density = apk
                .and_then(|a| a.density)
                .filter(|d| *d == ApkDensity::Xxhdpi)
                .map(|d| d.token())
                .unwrap_or("alldpi");
            Ok(Some(format!(
                "coresvc_{}_arm64_{}_release.apk",
                platform, density
            )))
        }
    }
}

/// Find the single `.apk` in an extracted payload directory.
async fn single_apk_name(dir: &crate::filesys::dir::Dir) -> Result<String, ProvisionError> {
    let mut apks: Vec<String> = dir
        .list_files()
        .await?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            name.ends_with(".apk").then_some(name)
        })
        .collect();

    match apks.len() {
        1 => Ok(apks.remove(0)),
        0 => Err(ProvisionError::StorageError(
            "no APK payload found in package".to_string(),
        )),
        _ => Err(ProvisionError::StorageError(format!(
            "ambiguous APK payload in package: {apks:?}"
        ))),
    }
}
