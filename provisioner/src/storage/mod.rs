//! Artifact storage collaborator
//!
//! A flat key-value object store used to cache extracted package payloads and
//! stage OS image files. Only the boundary is modeled here; the production
//! adapter in [`client`] is a thin HTTP shim.

pub mod client;

use std::path::Path;

use async_trait::async_trait;

use crate::errors::ProvisionError;

/// Storage boundary for one bucket.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file to `key`. An object that already exists under the
    /// key is success, not an error.
    async fn upload(&self, local: &Path, key: &str) -> Result<(), ProvisionError>;

    /// List object names directly under a prefix.
    async fn list(&self, prefix: &str, delimiter: &str) -> Result<Vec<String>, ProvisionError>;

    /// Fully-qualified URL of an object, suitable for device-side copies.
    fn object_url(&self, key: &str) -> String;
}
