mod direct_tool;
mod inventory;

pub use direct_tool::{parse_capacity_report, DirectTool};
pub use inventory::{parse_inventory, DeviceRecord, InventoryScan};

use crate::errors::{Result, RingError};
use crate::remote::RemoteExecutor;
use crate::topology::disk_stem;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub const DEVICE_ROOT: &str = "/dev";

/// Placement weight and metadata tag of one disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskMetadata {
    pub weight: u64,
    pub identifier: String,
}

/// Source of capacity and identifier for a block device on a remote host.
#[async_trait]
pub trait DiskInventory: Send + Sync + 'static {
    async fn capacity(&self, host: &str, device: &str) -> Result<u64>;
    async fn identifier(&self, host: &str, device: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSourceKind {
    /// One `lshw` inventory per host
    #[default]
    Inventory,
    /// `fdisk` and `lsblk` per disk
    DirectTool,
}

impl fmt::Display for MetadataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataSourceKind::Inventory => f.write_str("inventory"),
            MetadataSourceKind::DirectTool => f.write_str("direct-tool"),
        }
    }
}

impl FromStr for MetadataSourceKind {
    type Err = RingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inventory" => Ok(MetadataSourceKind::Inventory),
            "direct-tool" | "direct_tool" => Ok(MetadataSourceKind::DirectTool),
            other => Err(RingError::invalid_field(
                "metadata_source",
                format!("unknown metadata source '{}'", other),
            )),
        }
    }
}

pub enum MetadataSource {
    InventoryScan(InventoryScan),
    DirectTool(DirectTool),
}

impl MetadataSource {
    pub fn new(kind: MetadataSourceKind, executor: Arc<dyn RemoteExecutor>) -> Self {
        match kind {
            MetadataSourceKind::Inventory => MetadataSource::InventoryScan(InventoryScan::new(executor)),
            MetadataSourceKind::DirectTool => MetadataSource::DirectTool(DirectTool::new(executor)),
        }
    }
}

#[async_trait]
impl DiskInventory for MetadataSource {
    async fn capacity(&self, host: &str, device: &str) -> Result<u64> {
        match self {
            MetadataSource::InventoryScan(source) => source.capacity(host, device).await,
            MetadataSource::DirectTool(source) => source.capacity(host, device).await,
        }
    }

    async fn identifier(&self, host: &str, device: &str) -> Result<String> {
        match self {
            MetadataSource::InventoryScan(source) => source.identifier(host, device).await,
            MetadataSource::DirectTool(source) => source.identifier(host, device).await,
        }
    }
}

type DeviceKey = (String, String);

/// Resolves disk metadata for one generation run.
///
/// Capacity and identifier are memoized per (host, block device), so partitions
/// sharing a device and the three ring passes never query a device twice.
pub struct DiskMetadataResolver {
    source: Box<dyn DiskInventory>,
    device_root: String,
    weights: DashMap<DeviceKey, Arc<OnceCell<u64>>>,
    identifiers: DashMap<DeviceKey, Arc<OnceCell<String>>>,
}

impl DiskMetadataResolver {
    pub fn new(source: impl DiskInventory) -> Self {
        DiskMetadataResolver {
            source: Box::new(source),
            device_root: DEVICE_ROOT.to_string(),
            weights: DashMap::new(),
            identifiers: DashMap::new(),
        }
    }

    pub fn with_device_root(mut self, device_root: impl Into<String>) -> Self {
        self.device_root = device_root.into();
        self
    }

    /// Block device path of a disk entry, `sdb1` -> `/dev/sdb`.
    pub fn block_device(&self, disk: &str) -> Result<String> {
        block_device_path(&self.device_root, disk)
    }

    pub async fn resolve(
        &self,
        node: &str,
        disk: &str,
        identifier_override: Option<&str>,
    ) -> Result<DiskMetadata> {
        let device = self.block_device(disk)?;
        let key = (node.to_string(), device.clone());

        let weight_cell = self.weights.entry(key.clone()).or_default().clone();
        let weight = *weight_cell
            .get_or_try_init(|| async {
                let weight = self.source.capacity(node, &device).await?;
                if weight == 0 {
                    return Err(RingError::metadata_parse(node, &device, "reported capacity is zero"));
                }
                Ok(weight)
            })
            .await?;

        let identifier = match identifier_override {
            Some(identifier) => identifier.to_string(),
            None => {
                let identifier_cell = self.identifiers.entry(key).or_default().clone();
                identifier_cell
                    .get_or_try_init(|| async {
                        let identifier = self.source.identifier(node, &device).await?;
                        if identifier.is_empty() {
                            return Err(RingError::metadata_parse(node, &device, "empty identifier"));
                        }
                        Ok(identifier)
                    })
                    .await?
                    .clone()
            }
        };

        debug!(target = "resolver", node, disk, device = %device, weight, identifier = %identifier, "resolved disk metadata");
        Ok(DiskMetadata { weight, identifier })
    }
}

pub fn block_device_path(device_root: &str, disk: &str) -> Result<String> {
    let stem = disk_stem(disk).ok_or_else(|| {
        RingError::invalid_field("disk", format!("'{}' must end with a partition number", disk))
    })?;
    Ok(format!("{}/{}", device_root.trim_end_matches('/'), stem))
}
