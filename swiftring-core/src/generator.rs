use crate::errors::{Result, RingError};
use crate::resolver::{DiskMetadata, DiskMetadataResolver};
use crate::topology::{RingDefinition, RingType};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Turns a ring definition and the discovered disk metadata into the ordered
/// `swift-ring-builder` invocations.
pub struct CommandGenerator {
    resolver: Arc<DiskMetadataResolver>,
}

impl CommandGenerator {
    pub fn new(resolver: Arc<DiskMetadataResolver>) -> Self {
        CommandGenerator { resolver }
    }

    /// Rings are generated in `account`, `container`, `object` order; each ring
    /// gets its create command, one add command per disk (zones and nodes
    /// sorted by name, disks as declared) and optionally a rebalance.
    ///
    /// All disks are resolved before the first command is produced, a single
    /// failure aborts the whole generation.
    pub async fn generate(
        &self,
        ring: &RingDefinition,
        output_dir: &Path,
        rebalance: bool,
        metadata_override: Option<&str>,
    ) -> Result<Vec<String>> {
        let metadata_override = metadata_override.filter(|meta| !meta.is_empty());
        let metadata = self.resolve_all(ring, metadata_override).await?;

        let placements = ring.placements();
        let mut commands = Vec::with_capacity(RingType::ALL.len() * (placements.len() + 2));
        for ring_type in RingType::ALL {
            let builder = builder_path(output_dir, ring_type);
            commands.push(format!(
                "{} {} create {} {} {}",
                ring.ring_builder_cmd(),
                builder,
                ring.part_power(),
                ring.replicas(),
                ring.min_part_hours()
            ));

            for placement in &placements {
                let disk_metadata = metadata
                    .get(&(placement.node.to_string(), placement.disk.to_string()))
                    .ok_or_else(|| {
                        RingError::Unrecoverable(format!(
                            "no metadata resolved for {} on {}",
                            placement.disk, placement.node
                        ))
                    })?;
                commands.push(format!(
                    "{} {} add {}-{}:{}/{}_{} {}",
                    ring.ring_builder_cmd(),
                    builder,
                    placement.zone,
                    placement.node,
                    ring.port(ring_type),
                    placement.disk,
                    disk_metadata.identifier,
                    disk_metadata.weight
                ));
            }

            if rebalance {
                commands.push(format!("{} {} rebalance", ring.ring_builder_cmd(), builder));
            }
        }

        info!(target = "generator", commands = commands.len(), disks = placements.len(), rebalance, "generated ring commands");
        Ok(commands)
    }

    /// One task per host; the disks of a host are resolved in order inside its task.
    async fn resolve_all(
        &self,
        ring: &RingDefinition,
        metadata_override: Option<&str>,
    ) -> Result<HashMap<(String, String), DiskMetadata>> {
        let mut per_host: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for placement in ring.placements() {
            let disks = per_host.entry(placement.node.to_string()).or_default();
            if !disks.iter().any(|disk| disk == placement.disk) {
                disks.push(placement.disk.to_string());
            }
        }

        let mut tasks = JoinSet::new();
        for (node, disks) in per_host {
            let resolver = Arc::clone(&self.resolver);
            let metadata_override = metadata_override.map(str::to_string);
            tasks.spawn(async move {
                let mut resolved = Vec::with_capacity(disks.len());
                for disk in disks {
                    let metadata = resolver
                        .resolve(&node, &disk, metadata_override.as_deref())
                        .await?;
                    resolved.push(((node.clone(), disk), metadata));
                }
                Ok::<_, RingError>(resolved)
            });
        }

        let mut metadata = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(resolved)) => metadata.extend(resolved),
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(RingError::Unrecoverable(format!(
                        "metadata resolution task failed: {}",
                        join_err
                    )));
                }
            }
        }
        debug!(target = "generator", disks = metadata.len(), "resolved all disk metadata");
        Ok(metadata)
    }
}

fn builder_path(output_dir: &Path, ring_type: RingType) -> String {
    output_dir
        .join(ring_type.builder_file())
        .display()
        .to_string()
}
