use crate::errors::{Result, RingError};
use crate::resolver::MetadataSourceKind;

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_RING_BUILDER_CMD: &str = "swift-ring-builder";
pub const DEFAULT_REPLICAS: u32 = 3;
pub const DEFAULT_MIN_PART_HOURS: u32 = 1;

/// The three rings of a Swift cluster.
///
/// The declaration order is the canonical generation order and is relied upon
/// by the tooling consuming the generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RingType {
    Account,
    Container,
    Object,
}

impl RingType {
    pub const ALL: [RingType; 3] = [RingType::Account, RingType::Container, RingType::Object];

    pub fn as_str(&self) -> &'static str {
        match self {
            RingType::Account => "account",
            RingType::Container => "container",
            RingType::Object => "object",
        }
    }

    /// File name of the builder file of this ring, `account.builder`.
    pub fn builder_file(&self) -> String {
        format!("{}.builder", self.as_str())
    }

    pub fn default_port(&self) -> u16 {
        match self {
            RingType::Object => 6000,
            RingType::Container => 6001,
            RingType::Account => 6002,
        }
    }
}

impl fmt::Display for RingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RingType {
    type Err = RingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(RingType::Account),
            "container" => Ok(RingType::Container),
            "object" => Ok(RingType::Object),
            other => Err(RingError::invalid_field(
                "ports",
                format!("unknown ring type '{}'", other),
            )),
        }
    }
}

/// Raw ring definition as found in the YAML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfiguration {
    /// Ring management executable, defaults to `swift-ring-builder`
    #[serde(default)]
    pub ring_builder_cmd: Option<String>,
    /// Per ring type port overrides
    #[serde(default)]
    pub ports: Option<BTreeMap<String, u32>>,
    /// Kept untyped so that numeric strings are accepted and errors name the field
    #[serde(default)]
    pub part_power: Option<Value>,
    #[serde(default)]
    pub replicas: Option<Value>,
    #[serde(default)]
    pub min_part_hours: Option<Value>,
    /// zone name -> node address -> node definition
    #[serde(default)]
    pub zones: Option<BTreeMap<String, BTreeMap<String, NodeDefinition>>>,
    /// Disk metadata retrieval strategy
    #[serde(default)]
    pub metadata_source: Option<MetadataSourceKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDefinition {
    #[serde(default)]
    pub disks: Vec<String>,
}

/// One disk of the topology, as visited by the canonical walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskPlacement<'a> {
    pub zone: &'a str,
    pub node: &'a str,
    pub disk: &'a str,
}

/// Validated, immutable description of the rings to build.
#[derive(Debug, Clone)]
pub struct RingDefinition {
    ring_builder_cmd: String,
    ports: BTreeMap<RingType, u16>,
    part_power: u32,
    replicas: u32,
    min_part_hours: u32,
    zones: BTreeMap<String, BTreeMap<String, NodeDefinition>>,
    metadata_source: MetadataSourceKind,
}

impl RingDefinition {
    /// Reads and validates a YAML ring definition.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RingError::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| RingError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(target = "topology", path = %path.display(), "loaded ring definition");
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // an empty document is an empty mapping, which then fails on part_power
        let config: LoadConfiguration = if content.trim().is_empty() {
            LoadConfiguration::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.try_into()
    }

    pub fn ring_builder_cmd(&self) -> &str {
        &self.ring_builder_cmd
    }

    pub fn ports(&self) -> &BTreeMap<RingType, u16> {
        &self.ports
    }

    pub fn port(&self, ring_type: RingType) -> u16 {
        self.ports
            .get(&ring_type)
            .copied()
            .unwrap_or_else(|| ring_type.default_port())
    }

    pub fn part_power(&self) -> u32 {
        self.part_power
    }

    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    pub fn min_part_hours(&self) -> u32 {
        self.min_part_hours
    }

    pub fn zones(&self) -> &BTreeMap<String, BTreeMap<String, NodeDefinition>> {
        &self.zones
    }

    pub fn metadata_source(&self) -> MetadataSourceKind {
        self.metadata_source
    }

    /// Every node address of the cluster, across all zones.
    pub fn nodes(&self) -> BTreeSet<String> {
        self.zones
            .values()
            .flat_map(|nodes| nodes.keys().cloned())
            .collect()
    }

    /// Zones and nodes in lexicographic order, disks in their declared order.
    pub fn placements(&self) -> Vec<DiskPlacement<'_>> {
        let mut placements = Vec::new();
        for (zone, nodes) in &self.zones {
            for (node, definition) in nodes {
                for disk in &definition.disks {
                    placements.push(DiskPlacement { zone, node, disk });
                }
            }
        }
        placements
    }
}

impl TryFrom<LoadConfiguration> for RingDefinition {
    type Error = RingError;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let part_power = match config.part_power {
            Some(ref value) => match integer_value(value) {
                Some(part_power) => part_power,
                None if value.is_number() => {
                    return Err(RingError::invalid_field(
                        "part_power",
                        "expected a positive integer",
                    ))
                }
                None => return Err(RingError::MissingRequiredField("part_power")),
            },
            None => return Err(RingError::MissingRequiredField("part_power")),
        };
        let part_power = positive("part_power", part_power)?;
        let replicas = optional_positive("replicas", config.replicas.as_ref(), DEFAULT_REPLICAS)?;
        let min_part_hours = optional_positive(
            "min_part_hours",
            config.min_part_hours.as_ref(),
            DEFAULT_MIN_PART_HOURS,
        )?;

        let ring_builder_cmd = match config.ring_builder_cmd {
            Some(cmd) if cmd.trim().is_empty() => {
                return Err(RingError::invalid_field("ring_builder_cmd", "must not be empty"))
            }
            Some(cmd) => cmd,
            None => DEFAULT_RING_BUILDER_CMD.to_string(),
        };

        let mut ports: BTreeMap<RingType, u16> = RingType::ALL
            .iter()
            .map(|ring_type| (*ring_type, ring_type.default_port()))
            .collect();
        for (name, port) in config.ports.unwrap_or_default() {
            let ring_type: RingType = name.parse()?;
            let port = u16::try_from(port)
                .ok()
                .filter(|port| *port > 0)
                .ok_or_else(|| {
                    RingError::invalid_field(
                        format!("ports.{}", ring_type),
                        format!("{} is not a valid port", port),
                    )
                })?;
            ports.insert(ring_type, port);
        }

        let zones = config.zones.unwrap_or_default();
        validate_zones(&zones)?;

        Ok(RingDefinition {
            ring_builder_cmd,
            ports,
            part_power,
            replicas,
            min_part_hours,
            zones,
            metadata_source: config.metadata_source.unwrap_or_default(),
        })
    }
}

/// Splits a disk name into its block device stem, `sdb1` -> `sdb`.
pub fn disk_stem(disk: &str) -> Option<&str> {
    let stem = disk.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.len() == disk.len() || stem.is_empty() {
        return None;
    }
    Some(stem)
}

fn validate_zones(zones: &BTreeMap<String, BTreeMap<String, NodeDefinition>>) -> Result<()> {
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for (zone, nodes) in zones {
        if zone.is_empty() {
            return Err(RingError::InvalidTopology("zone names must not be empty".into()));
        }
        for (node, definition) in nodes {
            if node.is_empty() {
                return Err(RingError::InvalidTopology(format!(
                    "zone {} has a node with an empty address",
                    zone
                )));
            }
            if let Some(previous) = owners.insert(node.as_str(), zone.as_str()) {
                return Err(RingError::InvalidTopology(format!(
                    "node {} appears in zones {} and {}",
                    node, previous, zone
                )));
            }
            for disk in &definition.disks {
                if disk_stem(disk).is_none() {
                    return Err(RingError::invalid_field(
                        format!("zones.{}.{}.disks", zone, node),
                        format!("disk '{}' must end with a partition number", disk),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn integer_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn positive(field: &str, value: u64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| RingError::invalid_field(field, format!("{} is not a positive integer", value)))
}

fn optional_positive(field: &str, value: Option<&Value>, default: u32) -> Result<u32> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let number = integer_value(value)
                .ok_or_else(|| RingError::invalid_field(field, "expected a positive integer"))?;
            positive(field, number)
        }
    }
}
