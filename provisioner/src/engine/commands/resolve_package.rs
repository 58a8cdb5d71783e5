//! Package resolution command

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::engine::command::ProvisionCommand;
use crate::errors::ProvisionError;
use crate::models::request::{ApkDensity, PackageKind, PackageSpec};
use crate::models::response::ProvisionStatus;
use crate::service::context::{ProvisionContext, ResolvedPackage};
use crate::registry::PackageRegistry;

/// Resolves each package spec to a pinned registry instance.
///
/// Specs without a concrete registry name are derived from their semantic
/// kind plus the device's OS version and APK attribute hints; the pinned
/// instance must declare a version-code tag.
pub struct ResolvePackageCommand {
    registry: Arc<dyn PackageRegistry>,
    config: Arc<ProvisionConfig>,
}

impl ResolvePackageCommand {
    pub fn new(registry: Arc<dyn PackageRegistry>, config: Arc<ProvisionConfig>) -> Self {
        Self { registry, config }
    }
}

#[async_trait]
impl ProvisionCommand for ResolvePackageCommand {
    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<(), ProvisionError> {
        let os_version = ctx
            .os
            .build_info
            .as_ref()
            .map(|info| info.os_version.clone())
            .unwrap_or_default();

        for task in ctx.packages.iter_mut() {
            let name = match &task.spec.name {
                Some(name) => name.clone(),
                None => derive_registry_name(&task.spec, &os_version, &self.config)?,
            };
            let version = task
                .spec
                .version
                .as_ref()
                .map(|v| v.selector())
                .unwrap_or("latest");

            let description = self.registry.describe(&name, version).await?;
            let version_code = description
                .tag_value(&self.config.version_code_tag)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    ProvisionError::RegistryError(format!(
                        "{} tag is empty or does not exist on {}",
                        self.config.version_code_tag, description.package_name
                    ))
                })?
                .to_string();

            info!(
                "resolved package {} -> instance {} (version_code {})",
                description.package_name, description.instance_id, version_code
            );
            task.resolved = Some(ResolvedPackage {
                registry_name: description.package_name,
                instance_id: description.instance_id,
                version_code,
                archive_path: None,
            });
        }
        Ok(())
    }

    fn error_message(&self) -> &'static str {
        "failed to resolve package in registry"
    }

    fn failure_status(&self) -> ProvisionStatus {
        ProvisionStatus::RegistryLookupFailed
    }
}

/// Derive a concrete registry name from a semantic package kind.
///
/// Defaults mirror the registry's naming convention: unspecified density maps
/// to `alldpi`, and kind-derived names always target the arm64 release build.
fn derive_registry_name(
    spec: &PackageSpec,
    os_version: &str,
    config: &ProvisionConfig,
) -> Result<String, ProvisionError> {
    let kind = spec.kind.ok_or_else(|| {
        ProvisionError::SpecError("package spec has neither a name nor a kind".to_string())
    })?;

    match kind {
        PackageKind::CoreService => {
            let platform = config.platform_map.get(os_version).ok_or_else(|| {
                ProvisionError::ConfigError(format!(
                    "missing core-service platform for Android OS v.{os_version}"
                ))
            })?;
            let density = spec
                .apk
                .as_ref()
                .and_then(|apk| apk.density)
                .filter(|density| *density == ApkDensity::Xxhdpi)
                .map(|density| density.token())
                .unwrap_or("alldpi");
            Ok(format!(
                "{}/coresvc_{}_arm64_{}_release_apk",
                config.core_service_registry_prefix, platform, density
            ))
        }
    }
}
