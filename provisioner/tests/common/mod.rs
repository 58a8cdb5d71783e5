//! Shared fakes for the integration tests
//!
//! The collaborators are faked behind their traits with scripted replies and
//! full call recording; no network, no real device.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dutprov::cancel::CancelToken;
use dutprov::config::ProvisionConfig;
use dutprov::errors::ProvisionError;
use dutprov::models::request::ProvisionRequest;
use dutprov::registry::{PackageDescription, PackageRegistry};
use dutprov::remote::poll::PollOptions;
use dutprov::remote::RemoteExecutor;
use dutprov::service::context::ProvisionContext;
use dutprov::service::workspace::Workspace;
use dutprov::storage::ArtifactStore;

// ================================ remote ======================================

#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<String>>,
    exact: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    rules: Mutex<Vec<(String, String)>>,
    fail_when: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script replies for an exact command line. Replies are consumed in
    /// order; the last one keeps answering.
    pub fn script_exact(&self, line: &str, replies: &[&str]) {
        let queue = replies
            .iter()
            .map(|reply| Ok(reply.to_string()))
            .collect::<VecDeque<_>>();
        self.exact.lock().unwrap().insert(line.to_string(), queue);
    }

    /// Persistent reply for any command line containing `substr`.
    pub fn rule(&self, substr: &str, reply: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((substr.to_string(), reply.to_string()));
    }

    /// Fail any invocation whose recorded line contains `substr`.
    pub fn fail_when(&self, substr: &str) {
        self.fail_when.lock().unwrap().push(substr.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, substr: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(substr))
            .count()
    }

    /// Position of the first call containing `substr`; panics when absent.
    pub fn call_index(&self, substr: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .position(|line| line.contains(substr))
            .unwrap_or_else(|| panic!("no call containing {substr:?}"))
    }

    fn record(&self, line: String) -> Result<(), ProvisionError> {
        let failed = self
            .fail_when
            .lock()
            .unwrap()
            .iter()
            .any(|substr| line.contains(substr));
        self.calls.lock().unwrap().push(line.clone());
        if failed {
            return Err(ProvisionError::RemoteError(format!("scripted failure: {line}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteExecutor for FakeRemote {
    async fn run_cmd(&self, cmd: &str, args: &[&str]) -> Result<String, ProvisionError> {
        let line = format!("{} {}", cmd, args.join(" "));
        self.record(line.clone())?;

        if let Some(queue) = self.exact.lock().unwrap().get_mut(&line) {
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(reply) = reply {
                return reply.map_err(ProvisionError::RemoteError);
            }
        }

        let rules = self.rules.lock().unwrap();
        if let Some((_, reply)) = rules.iter().find(|(substr, _)| line.contains(substr)) {
            return Ok(reply.clone());
        }
        Ok(String::new())
    }

    async fn copy_data(&self, source_url: &str, dst_path: &str) -> Result<(), ProvisionError> {
        self.record(format!("copy_data {} {}", source_url, dst_path))
    }

    async fn create_directories(&self, dirs: &[&str]) -> Result<(), ProvisionError> {
        self.record(format!("create_directories {}", dirs.join(" ")))
    }

    async fn delete_directory(&self, dir: &str) -> Result<(), ProvisionError> {
        self.record(format!("delete_directory {}", dir))
    }
}

// =============================== registry =====================================

#[derive(Default)]
pub struct FakeRegistry {
    descriptions: Mutex<HashMap<String, PackageDescription>>,
    archive: Mutex<Vec<u8>>,
    pub fetches: Mutex<Vec<String>>,
    pub fail_describe: Mutex<bool>,
    pub fail_fetch: Mutex<bool>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe_as(&self, requested_name: &str, description: PackageDescription) {
        self.descriptions
            .lock()
            .unwrap()
            .insert(requested_name.to_string(), description);
    }

    /// Bytes written to the destination of every fetch.
    pub fn archive_bytes(&self, bytes: Vec<u8>) {
        *self.archive.lock().unwrap() = bytes;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn describe(
        &self,
        name: &str,
        _version: &str,
    ) -> Result<PackageDescription, ProvisionError> {
        if *self.fail_describe.lock().unwrap() {
            return Err(ProvisionError::RegistryError("scripted describe failure".into()));
        }
        self.descriptions
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisionError::RegistryError(format!("no such package: {name}")))
    }

    async fn fetch_instance_to(
        &self,
        _package_name: &str,
        instance_id: &str,
        dest: &Path,
    ) -> Result<(), ProvisionError> {
        if *self.fail_fetch.lock().unwrap() {
            return Err(ProvisionError::RegistryError("scripted fetch failure".into()));
        }
        self.fetches.lock().unwrap().push(instance_id.to_string());
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, self.archive.lock().unwrap().as_slice())?;
        Ok(())
    }
}

// ================================ storage =====================================

#[derive(Default)]
pub struct FakeStore {
    pub uploads: Mutex<Vec<String>>,
    listing: Mutex<Vec<String>>,
    pub fail_upload: Mutex<bool>,
    pub fail_list: Mutex<bool>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(&self, names: &[&str]) {
        *self.listing.lock().unwrap() = names.iter().map(|s| s.to_string()).collect();
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload(&self, _local: &Path, key: &str) -> Result<(), ProvisionError> {
        if *self.fail_upload.lock().unwrap() {
            return Err(ProvisionError::StorageError("scripted upload failure".into()));
        }
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn list(&self, _prefix: &str, _delimiter: &str) -> Result<Vec<String>, ProvisionError> {
        if *self.fail_list.lock().unwrap() {
            return Err(ProvisionError::StorageError("scripted list failure".into()));
        }
        Ok(self.listing.lock().unwrap().clone())
    }

    fn object_url(&self, key: &str) -> String {
        format!("fake://store/{key}")
    }
}

// ================================ helpers =====================================

/// A zip archive holding the given (name, contents) entries.
pub fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

/// Config with millisecond polling so tests never sleep for real.
pub fn fast_config() -> ProvisionConfig {
    let mut config = ProvisionConfig::default();
    let fast = |max_attempts: u32| PollOptions {
        interval: std::time::Duration::from_millis(1),
        max_attempts,
    };
    config.poll.normal = fast(18);
    config.poll.post_flash = fast(30);
    config.poll.bootloader = fast(30);
    config
}

/// Build a run context over the fake remote with an ephemeral workspace.
pub fn make_context(request: ProvisionRequest, remote: Arc<FakeRemote>) -> ProvisionContext {
    let host: Arc<dyn RemoteExecutor> = remote;
    ProvisionContext::new(request, host, CancelToken::inert(), Workspace::ephemeral())
}

/// Parse a request from JSON literal.
pub fn request_from_json(raw: &str) -> ProvisionRequest {
    serde_json::from_str(raw).unwrap()
}
