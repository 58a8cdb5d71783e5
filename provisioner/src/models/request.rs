//! Provisioning request model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A provisioning request received from the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Target device
    pub device: DeviceSpec,

    /// Desired OS image, if an OS flash is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_image: Option<OsImageSource>,

    /// Packages to bring to their resolved registry versions
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Stable device serial number
    pub serial_number: String,
}

/// Where the desired OS build lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsImageSource {
    /// Explicit folder in the image bucket
    StoragePath(StoragePath),

    /// Board-keyed build table; the entry matching the device board wins
    BuildMap(HashMap<String, String>),
}

/// Explicit image bucket location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoragePath {
    /// Override of the default image bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Build folder holding the partition images and update archive.
    /// The final path segment is the build id.
    pub folder: String,
}

/// One requested package.
///
/// Either `name` pins a concrete registry package, or `kind` (plus optional
/// APK attribute hints) selects one through the naming convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Concrete registry package path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Registry version selector; defaults to the "latest" ref
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PackageVersion>,

    /// Semantic package kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PackageKind>,

    /// APK attribute hints for naming-convention resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk: Option<ApkDetails>,
}

/// Registry version selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageVersion {
    Ref(String),
    Tag(String),
    InstanceId(String),
}

impl PackageVersion {
    /// The raw selector string handed to the registry.
    pub fn selector(&self) -> &str {
        match self {
            PackageVersion::Ref(v) => v,
            PackageVersion::Tag(v) => v,
            PackageVersion::InstanceId(v) => v,
        }
    }
}

/// Semantic package kinds resolvable through the naming convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    CoreService,
}

/// APK attributes used by the package naming convention
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApkDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ApkArchitecture>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<ApkBuildType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<ApkDensity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_purpose: Option<ApkBuildPurpose>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApkArchitecture {
    Arm64,
    X86_64,
    Armv7,
    X86,
}

impl ApkArchitecture {
    pub fn token(&self) -> &'static str {
        match self {
            ApkArchitecture::Arm64 => "arm64",
            ApkArchitecture::X86_64 => "x86_64",
            ApkArchitecture::Armv7 => "arm7",
            ApkArchitecture::X86 => "x86",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApkBuildType {
    PhonePreLmp,
    PhoneLmp,
    PhoneMnc,
    PhonePi,
    PhoneRvc,
    PhoneSc,
    PhoneNext,
    PhoneGo,
    PhoneGoR,
    PhoneGoS,
}

impl ApkBuildType {
    pub fn token(&self) -> &'static str {
        match self {
            ApkBuildType::PhonePreLmp => "prod",
            ApkBuildType::PhoneLmp => "prodlmp",
            ApkBuildType::PhoneMnc => "prodmnc",
            ApkBuildType::PhonePi => "prodpi",
            ApkBuildType::PhoneRvc => "prodrvc",
            ApkBuildType::PhoneSc => "prodsc",
            ApkBuildType::PhoneNext => "prodnext",
            ApkBuildType::PhoneGo => "prodgo",
            ApkBuildType::PhoneGoR => "prodgor",
            ApkBuildType::PhoneGoS => "prodgos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApkDensity {
    Mdpi,
    Hdpi,
    Xhdpi,
    Xxhdpi,
    Alldpi,
}

impl ApkDensity {
    pub fn token(&self) -> &'static str {
        match self {
            ApkDensity::Mdpi => "mdpi",
            ApkDensity::Hdpi => "hdpi",
            ApkDensity::Xhdpi => "xhdpi",
            ApkDensity::Xxhdpi => "xxhdpi",
            ApkDensity::Alldpi => "alldpi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApkBuildPurpose {
    Raw,
    Release,
    Debug,
    DebugShrunk,
}

impl ApkBuildPurpose {
    pub fn token(&self) -> &'static str {
        match self {
            ApkBuildPurpose::Raw => "raw",
            ApkBuildPurpose::Release => "release",
            ApkBuildPurpose::Debug => "debug",
            ApkBuildPurpose::DebugShrunk => "debug_shrunk",
        }
    }
}
