//! Static provisioning configuration
//!
//! Lookup tables and tool settings resolved once at process start and passed
//! immutably to the commands that need them. Nothing in here is mutated after
//! construction.

use std::collections::HashMap;
use std::time::Duration;

use crate::remote::poll::PollOptions;

/// Process-wide provisioning configuration.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Storage bucket holding Android OS image builds.
    pub image_bucket: String,

    /// Storage bucket caching extracted package payloads.
    pub package_bucket: String,

    /// Android package name of the core-service APK family.
    pub core_service_package: String,

    /// Registry path prefix for the core-service package family.
    pub core_service_registry_prefix: String,

    /// Registry tag carrying a package's declared version code.
    pub version_code_tag: String,

    /// Android OS release version -> core-service platform token.
    pub platform_map: HashMap<String, String>,

    /// Device-side staging directory for OS images. Must live on writable
    /// persistent storage: the default tmpfs lacks the capacity for a full
    /// image set.
    pub device_image_dir: String,

    /// Readiness polling bounds.
    pub poll: PollSettings,
}

/// Polling bounds per wait flavor.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Normal-mode wait used outside the flash path.
    pub normal: PollOptions,

    /// Normal-mode wait after a full flash; boot takes longer to settle.
    pub post_flash: PollOptions,

    /// Bootloader-mode wait.
    pub bootloader: PollOptions,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            normal: PollOptions {
                interval: Duration::from_secs(10),
                max_attempts: 18,
            },
            post_flash: PollOptions {
                interval: Duration::from_secs(10),
                max_attempts: 30,
            },
            bootloader: PollOptions {
                interval: Duration::from_secs(2),
                max_attempts: 30,
            },
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            image_bucket: "dut-os-images".to_string(),
            package_bucket: "dut-package-cache".to_string(),
            core_service_package: "com.lab.coreservice".to_string(),
            core_service_registry_prefix: "thirdparty/coresvc".to_string(),
            version_code_tag: "version_code".to_string(),
            platform_map: default_platform_map(),
            device_image_dir: "/mnt/stateful_partition/android_provision".to_string(),
            poll: PollSettings::default(),
        }
    }
}

fn default_platform_map() -> HashMap<String, String> {
    [
        ("9", "prodpi"),
        ("10", "prodrvc"),
        ("11", "prodrvc"),
        ("12", "prodsc"),
        ("13", "prodnext"),
        ("14", "prodnext"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
