//! Local scratch workspace for one provisioning run

use std::path::{Path, PathBuf};

use crate::errors::ProvisionError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Per-run scratch directory layout.
///
/// Downloaded archives and extracted payloads are keyed by registry instance
/// id, so a rerun pointed at the same workspace reuses completed downloads
/// and extractions.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Dir,
}

impl Workspace {
    /// Use an explicit workspace directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Dir::new(root),
        }
    }

    /// A fresh workspace under the system temp directory.
    pub fn ephemeral() -> Self {
        let root = std::env::temp_dir().join(format!("dutprov-{}", uuid::Uuid::new_v4()));
        Self::new(root)
    }

    /// Create the workspace directories.
    pub async fn setup(&self) -> Result<(), ProvisionError> {
        self.archives_dir().create().await?;
        self.payloads_dir().create().await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    fn archives_dir(&self) -> Dir {
        self.root.subdir("archives")
    }

    fn payloads_dir(&self) -> Dir {
        self.root.subdir("payloads")
    }

    /// Local path for a fetched package archive.
    pub fn archive_file(&self, instance_id: &str) -> File {
        self.archives_dir().file(&format!("{}.zip", instance_id))
    }

    /// Extraction directory for a package instance.
    pub fn payload_dir(&self, instance_id: &str) -> Dir {
        self.payloads_dir().subdir(instance_id)
    }

    /// Remove the workspace and everything in it.
    pub async fn remove(&self) -> Result<(), ProvisionError> {
        self.root.delete().await
    }
}
