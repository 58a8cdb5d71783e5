//! Error types for the provisioning agent

use thiserror::Error;

/// Main error type for the provisioning agent
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("Invalid request: {0}")]
    SpecError(String),

    #[error("Remote execution error: {0}")]
    RemoteError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Flash error: {0}")]
    FlashError(String),

    #[error("Install error: {0}")]
    InstallError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Device not ready after {attempts} probes")]
    PollTimeout { attempts: u32 },

    #[error("Device reported unauthorized {observations} times in a row; check trust pairing")]
    DeviceUnauthorized { observations: u32 },

    #[error("Provisioning cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ProvisionError {
    fn from(err: anyhow::Error) -> Self {
        ProvisionError::Internal(err.to_string())
    }
}
