//! Remote execution boundary
//!
//! Every device interaction goes through [`RemoteExecutor`]: a named tool
//! invoked with a fixed positional argument list on the host that owns the
//! device connection. The engine consumes this boundary and never implements
//! transport concerns beyond the thin adapter in [`host`].

pub mod host;
pub mod poll;

use async_trait::async_trait;

use crate::errors::ProvisionError;

/// Command execution, file transfer and directory operations against one
/// device's associated host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a named tool with positional arguments; returns captured stdout.
    async fn run_cmd(&self, cmd: &str, args: &[&str]) -> Result<String, ProvisionError>;

    /// Copy a remote object (by URL) onto the host at `dst_path`.
    async fn copy_data(&self, source_url: &str, dst_path: &str) -> Result<(), ProvisionError>;

    /// Create directories (and parents) on the host.
    async fn create_directories(&self, dirs: &[&str]) -> Result<(), ProvisionError>;

    /// Recursively delete a directory on the host.
    async fn delete_directory(&self, dir: &str) -> Result<(), ProvisionError>;
}
