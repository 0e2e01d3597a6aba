use super::DiskInventory;
use crate::errors::{Result, RingError};
use crate::remote::RemoteExecutor;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Capacity in whole gigabytes from an `fdisk -l` report, taken from the line
/// `Disk /dev/sdb: 500.1 GB, 500107862016 bytes`.
pub fn parse_capacity_report(report: &str) -> Option<u64> {
    report.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix("Disk ")?;
        let (_, sizes) = rest.split_once(": ")?;
        if !sizes.contains("bytes") {
            return None;
        }
        let mut tokens = sizes.split_whitespace();
        let gigabytes: f64 = tokens.next()?.parse().ok()?;
        let unit = tokens.next()?.trim_end_matches(',');
        if unit != "GB" && unit != "GiB" {
            return None;
        }
        if !gigabytes.is_finite() || gigabytes < 0.0 {
            return None;
        }
        Some(gigabytes.trunc() as u64)
    })
}

/// Direct tool strategy: `fdisk` for capacity and `lsblk` for the WWN, two
/// independent privileged queries per disk.
pub struct DirectTool {
    executor: Arc<dyn RemoteExecutor>,
}

impl DirectTool {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        DirectTool { executor }
    }

    pub fn capacity_command(device: &str) -> String {
        format!("fdisk -l {}", device)
    }

    pub fn identifier_command(device: &str) -> String {
        format!("lsblk --nodeps --noheadings --output WWN {}", device)
    }
}

#[async_trait]
impl DiskInventory for DirectTool {
    async fn capacity(&self, host: &str, device: &str) -> Result<u64> {
        let report = self
            .executor
            .run_checked(host, &Self::capacity_command(device), true)
            .await?;
        let weight = parse_capacity_report(&report)
            .ok_or_else(|| RingError::metadata_parse(host, device, "no capacity line in fdisk report"))?;
        debug!(target = "resolver", host, device, weight, "parsed fdisk capacity");
        Ok(weight)
    }

    async fn identifier(&self, host: &str, device: &str) -> Result<String> {
        let output = self
            .executor
            .run_checked(host, &Self::identifier_command(device), true)
            .await?;
        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RingError::metadata_parse(host, device, "lsblk reported no identifier"))
    }
}
