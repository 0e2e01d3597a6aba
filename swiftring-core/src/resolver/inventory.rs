use super::DiskInventory;
use crate::errors::{Result, RingError};
use crate::remote::RemoteExecutor;

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const INVENTORY_COMMAND: &str = "lshw -C disk";

/// One device entry of an `lshw -C disk` listing.
///
/// Keys are the lshw attribute names with whitespace replaced by `_`,
/// e.g. `logical name` becomes `logical_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRecord {
    pub class: String,
    pub fields: BTreeMap<String, String>,
}

impl DeviceRecord {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn logical_name(&self) -> Option<&str> {
        self.field("logical_name")
    }

    pub fn size(&self) -> Option<&str> {
        self.field("size")
    }

    pub fn serial(&self) -> Option<&str> {
        self.field("serial")
    }
}

/// Splits an `lshw` listing into device records. Chunks without a `-class`
/// header line are dropped.
pub fn parse_inventory(output: &str) -> Vec<DeviceRecord> {
    let mut records = Vec::new();
    for chunk in output.trim().split('*') {
        let mut record = DeviceRecord::default();
        let mut has_class = false;
        for line in chunk.lines() {
            if let Some(class) = class_line(line) {
                record.class = class.to_string();
                has_class = true;
            } else if let Some((key, value)) = attribute_line(line) {
                record.fields.insert(key, value.to_string());
            }
        }
        if has_class {
            records.push(record);
        }
    }
    records
}

// `-disk:0` -> `disk`
fn class_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('-')?;
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

// `       logical name: /dev/sda` -> (`logical_name`, `/dev/sda`)
fn attribute_line(line: &str) -> Option<(String, &str)> {
    let trimmed = line.trim_start();
    if trimmed.len() == line.len() {
        return None;
    }
    let (key, value) = trimmed.split_once(':')?;
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c.is_whitespace())
    {
        return None;
    }
    if !value.starts_with(char::is_whitespace) {
        return None;
    }
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let key = key
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    Some((key, value))
}

/// Leading integer of an lshw size such as `465GiB (500GB)`, the unit must be MiB or GiB.
pub fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim_start();
    let digits = size.find(|c: char| !c.is_ascii_digit()).unwrap_or(size.len());
    if digits == 0 {
        return None;
    }
    let unit = &size[digits..];
    if !(unit.starts_with("MiB") || unit.starts_with("GiB")) {
        return None;
    }
    size[..digits].parse().ok()
}

/// Inventory scan strategy: one `lshw` listing per host, shared by every
/// disk of that host for the lifetime of the instance.
pub struct InventoryScan {
    executor: Arc<dyn RemoteExecutor>,
    inventories: DashMap<String, Arc<OnceCell<Arc<Vec<DeviceRecord>>>>>,
}

impl InventoryScan {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        InventoryScan {
            executor,
            inventories: DashMap::new(),
        }
    }

    /// Parsed inventory of `host`; concurrent callers share a single fetch.
    pub async fn inventory(&self, host: &str) -> Result<Arc<Vec<DeviceRecord>>> {
        let cell = self.inventories.entry(host.to_string()).or_default().clone();
        let records = cell
            .get_or_try_init(|| async {
                let output = self.executor.run_checked(host, INVENTORY_COMMAND, true).await?;
                let records = parse_inventory(&output);
                info!(target = "resolver", host, devices = records.len(), "fetched disk inventory");
                Ok::<_, RingError>(Arc::new(records))
            })
            .await?;
        Ok(Arc::clone(records))
    }

    async fn record(&self, host: &str, device: &str) -> Result<DeviceRecord> {
        let inventory = self.inventory(host).await?;
        inventory
            .iter()
            .find(|record| record.logical_name() == Some(device))
            .cloned()
            .ok_or_else(|| RingError::DiskNotFound {
                host: host.to_string(),
                device: device.to_string(),
            })
    }
}

#[async_trait]
impl DiskInventory for InventoryScan {
    async fn capacity(&self, host: &str, device: &str) -> Result<u64> {
        let record = self.record(host, device).await?;
        let size = record
            .size()
            .ok_or_else(|| RingError::metadata_parse(host, device, "no size reported"))?;
        let weight = parse_size(size).ok_or_else(|| {
            RingError::metadata_parse(host, device, format!("unexpected size '{}'", size))
        })?;
        debug!(target = "resolver", host, device, size, weight, "parsed inventory size");
        Ok(weight)
    }

    async fn identifier(&self, host: &str, device: &str) -> Result<String> {
        let record = self.record(host, device).await?;
        record
            .serial()
            .map(str::to_string)
            .ok_or_else(|| RingError::metadata_parse(host, device, "no serial reported"))
    }
}
