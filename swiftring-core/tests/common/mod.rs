#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use swiftring_core::{
    ArtifactTransport, CommandOutput, DiskMetadataResolver, MetadataSource, MetadataSourceKind,
    RemoteExecutor, Result, RingError,
};

/// In-memory cluster: every host answers `lshw -C disk` with a listing built
/// from its registered disks.
#[derive(Default)]
pub struct FakeCluster {
    inventories: HashMap<String, String>,
    failing_hosts: BTreeSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeCluster {
    /// Registers `devices` as (device name, size, serial) on `host`.
    pub fn host(mut self, host: &str, devices: &[(&str, &str, &str)]) -> Self {
        let mut listing = String::new();
        for (index, (name, size, serial)) in devices.iter().enumerate() {
            listing.push_str(&format!(
                "  *-disk:{index}\n       description: ATA Disk\n       logical name: /dev/{name}\n       serial: {serial}\n       size: {size}\n"
            ));
        }
        self.inventories.insert(host.to_string(), listing);
        self
    }

    pub fn failing_host(mut self, host: &str) -> Self {
        self.failing_hosts.insert(host.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, host: &str) -> usize {
        self.calls().iter().filter(|(h, _)| h == host).count()
    }
}

#[async_trait]
impl RemoteExecutor for FakeCluster {
    async fn run(&self, host: &str, command: &str, _privileged: bool) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));
        if self.failing_hosts.contains(host) {
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: "Permission denied (publickey)".to_string(),
                exit_code: 255,
            });
        }
        match (command, self.inventories.get(host)) {
            ("lshw -C disk", Some(listing)) => Ok(CommandOutput {
                stdout: listing.clone(),
                ..Default::default()
            }),
            _ => Err(RingError::RemoteCommandError {
                host: host.to_string(),
                command: command.to_string(),
                detail: "no route to host".to_string(),
            }),
        }
    }
}

pub fn inventory_resolver(cluster: Arc<FakeCluster>) -> Arc<DiskMetadataResolver> {
    Arc::new(DiskMetadataResolver::new(MetadataSource::new(
        MetadataSourceKind::Inventory,
        cluster,
    )))
}

/// Transport that copies into `<root>/<node>` and fails for selected nodes.
pub struct DirectoryTransport {
    pub root: PathBuf,
    pub failing_nodes: BTreeSet<String>,
    pub pushes: Mutex<Vec<String>>,
}

impl DirectoryTransport {
    pub fn new(root: &Path) -> Self {
        DirectoryTransport {
            root: root.to_path_buf(),
            failing_nodes: BTreeSet::new(),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, node: &str) -> Self {
        self.failing_nodes.insert(node.to_string());
        self
    }
}

#[async_trait]
impl ArtifactTransport for DirectoryTransport {
    async fn push(&self, source_dir: &Path, node: &str, _target_dir: &Path) -> Result<()> {
        self.pushes.lock().unwrap().push(node.to_string());
        if self.failing_nodes.contains(node) {
            return Err(RingError::DistributionFailed {
                node: node.to_string(),
                detail: "connection refused".to_string(),
            });
        }
        swiftring_core::distribution::copy_dir_contents(source_dir, &self.root.join(node))
            .await
            .map_err(|err| RingError::DistributionFailed {
                node: node.to_string(),
                detail: err.to_string(),
            })?;
        Ok(())
    }
}
