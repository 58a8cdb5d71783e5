//! Package registry collaborator
//!
//! A versioned package store queried for instance metadata and fetched for
//! archives. Only the boundary is modeled here; the production adapter in
//! [`client`] is a thin HTTP shim.

pub mod client;

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::ProvisionError;

/// A pinned package instance as described by the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescription {
    /// Concrete package name
    pub package_name: String,

    /// Pinned instance id
    pub instance_id: String,

    /// Declared `key:value` tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PackageDescription {
    /// Value of the first tag with the given key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|tag| {
            let (tag_key, value) = tag.split_once(':')?;
            (tag_key == key).then_some(value)
        })
    }
}

/// Registry boundary: describe-by-specification and fetch-to-local-path.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Resolve a package name and version selector to a pinned instance.
    async fn describe(
        &self,
        name: &str,
        version: &str,
    ) -> Result<PackageDescription, ProvisionError>;

    /// Download a pinned instance archive to `dest`.
    async fn fetch_instance_to(
        &self,
        package_name: &str,
        instance_id: &str,
        dest: &Path,
    ) -> Result<(), ProvisionError>;
}
