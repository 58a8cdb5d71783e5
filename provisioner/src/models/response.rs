//! Provisioning response model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured outcome written back to the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub outcome: Outcome,

    /// Best-effort build info snapshot: the updated info when a flash
    /// happened, otherwise whatever was read before the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_info: Option<OsBuildInfo>,

    /// Packages actually updated during this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<InstalledPackage>,

    pub finished_at: DateTime<Utc>,
}

/// Run outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(Failure),
}

/// Classified failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub status: ProvisionStatus,
    pub message: String,
}

/// Closed enumeration of failure classifications.
///
/// Every command maps to exactly one of these, so the caller always receives
/// a single specific status regardless of the underlying cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStatus {
    InvalidRequest,
    DutUnreachablePreProvision,
    PreProvisionSetupFailed,
    RegistryLookupFailed,
    RegistryFetchFailed,
    StorageUploadFailed,
    StorageDownloadFailed,
    ProvisioningFailed,
    PostProvisionSetupFailed,
}

/// Android OS build info as read from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsBuildInfo {
    /// Build id (`ro.build.id`)
    pub id: String,

    /// OS release version (`ro.build.version.release`)
    pub os_version: String,

    /// Incremental build version (`ro.build.version.incremental`)
    pub incremental_version: String,
}

/// A package version established on the device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version_code: String,
}
