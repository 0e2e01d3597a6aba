use crate::errors::RingError;
use crate::resolver::MetadataSourceKind;
use crate::topology::{disk_stem, RingDefinition, RingType, DEFAULT_RING_BUILDER_CMD};

use std::collections::BTreeSet;

const TWO_ZONES: &str = r#"
part_power: 10
zones:
  z2:
    10.0.0.3:
      disks: [sdb1]
  z1:
    10.0.0.2:
      disks: [sdc1, sdb1]
    10.0.0.1:
      disks: [sda1]
"#;

/// Test: defaults are applied when only the required field is present
///
/// Expected
/// - swift-ring-builder, 3 replicas, 1 hour, ports 6000/6001/6002 and no zones.
#[test]
fn minimal_definition_takes_defaults() {
    let ring = RingDefinition::from_yaml_str("part_power: 18").expect("valid definition");
    assert_eq!(ring.ring_builder_cmd(), DEFAULT_RING_BUILDER_CMD);
    assert_eq!(ring.part_power(), 18);
    assert_eq!(ring.replicas(), 3);
    assert_eq!(ring.min_part_hours(), 1);
    assert_eq!(ring.port(RingType::Object), 6000);
    assert_eq!(ring.port(RingType::Container), 6001);
    assert_eq!(ring.port(RingType::Account), 6002);
    assert_eq!(ring.metadata_source(), MetadataSourceKind::Inventory);
    assert!(ring.nodes().is_empty());
    assert!(ring.placements().is_empty());
}

#[test]
fn explicit_values_and_partial_ports() {
    let yaml = r#"
ring_builder_cmd: /usr/bin/swift-ring-builder
part_power: "12"
replicas: 2
min_part_hours: 24
ports:
  object: 16000
metadata_source: direct_tool
"#;
    let ring = RingDefinition::from_yaml_str(yaml).expect("valid definition");
    assert_eq!(ring.ring_builder_cmd(), "/usr/bin/swift-ring-builder");
    assert_eq!(ring.part_power(), 12);
    assert_eq!(ring.replicas(), 2);
    assert_eq!(ring.min_part_hours(), 24);
    assert_eq!(ring.port(RingType::Object), 16000);
    // ring types not named keep their default port
    assert_eq!(ring.port(RingType::Account), 6002);
    assert_eq!(ring.metadata_source(), MetadataSourceKind::DirectTool);
}

/// Test: missing or non numeric part_power is reported as a missing required field
#[test]
fn part_power_is_required() {
    for yaml in ["replicas: 3", "part_power:", "part_power: ten", "", "part_power: [1]"] {
        let err = RingDefinition::from_yaml_str(yaml).unwrap_err();
        assert!(
            matches!(err, RingError::MissingRequiredField("part_power")),
            "{yaml:?} gave {err:?}"
        );
    }
}

#[test]
fn non_positive_values_are_rejected() {
    for yaml in ["part_power: 0", "part_power: -4", "part_power: 10\nreplicas: 0", "part_power: 10\nmin_part_hours: x"] {
        let err = RingDefinition::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RingError::InvalidField { .. }), "{yaml:?} gave {err:?}");
    }
}

#[test]
fn unknown_fields_are_rejected() {
    let err = RingDefinition::from_yaml_str("part_power: 10\nreplica: 3").unwrap_err();
    assert!(matches!(err, RingError::ConfigParse(_)));

    let err = RingDefinition::from_yaml_str("part_power: 10\nports:\n  proxy: 8080").unwrap_err();
    assert!(matches!(err, RingError::InvalidField { .. }));

    let yaml = "part_power: 10\nzones:\n  z1:\n    10.0.0.1:\n      disks: [sda1]\n      weight: 3";
    let err = RingDefinition::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, RingError::ConfigParse(_)));
}

#[test]
fn invalid_ports_are_rejected() {
    for yaml in ["part_power: 10\nports:\n  object: 0", "part_power: 10\nports:\n  object: 70000"] {
        let err = RingDefinition::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RingError::InvalidField { .. }), "{yaml:?} gave {err:?}");
    }
}

/// Test: nodes() is the union of node addresses across zones
#[test]
fn nodes_is_union_of_zone_nodes() {
    let ring = RingDefinition::from_yaml_str(TWO_ZONES).expect("valid definition");
    let expected: BTreeSet<String> = ["10.0.0.1", "10.0.0.2", "10.0.0.3"]
        .iter()
        .map(|node| node.to_string())
        .collect();
    assert_eq!(ring.nodes(), expected);
    // repeated calls are pure
    assert_eq!(ring.nodes(), ring.nodes());
}

/// Test: the canonical walk sorts zones and nodes but keeps the disk order
#[test]
fn placements_follow_canonical_order() {
    let ring = RingDefinition::from_yaml_str(TWO_ZONES).expect("valid definition");
    let walk: Vec<(&str, &str, &str)> = ring
        .placements()
        .iter()
        .map(|p| (p.zone, p.node, p.disk))
        .collect();
    assert_eq!(
        walk,
        vec![
            ("z1", "10.0.0.1", "sda1"),
            ("z1", "10.0.0.2", "sdc1"),
            ("z1", "10.0.0.2", "sdb1"),
            ("z2", "10.0.0.3", "sdb1"),
        ]
    );
}

#[test]
fn node_in_two_zones_is_rejected() {
    let yaml = r#"
part_power: 10
zones:
  z1:
    10.0.0.1:
      disks: [sda1]
  z2:
    10.0.0.1:
      disks: [sdb1]
"#;
    let err = RingDefinition::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, RingError::InvalidTopology(_)));
}

#[test]
fn disk_without_partition_number_is_rejected() {
    let yaml = "part_power: 10\nzones:\n  z1:\n    10.0.0.1:\n      disks: [sda]";
    let err = RingDefinition::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, RingError::InvalidField { .. }));
}

#[test]
fn disk_stem_strips_trailing_digits() {
    assert_eq!(disk_stem("sdb1"), Some("sdb"));
    assert_eq!(disk_stem("sda10"), Some("sda"));
    assert_eq!(disk_stem("sda"), None);
    assert_eq!(disk_stem("123"), None);
}

#[test]
fn load_reports_missing_file() {
    let err = RingDefinition::load("/nonexistent/swiftring/rings.yaml").unwrap_err();
    assert!(matches!(err, RingError::ConfigNotFound(_)));
}

#[test]
fn ring_types_parse_and_order() {
    assert_eq!(RingType::ALL, [RingType::Account, RingType::Container, RingType::Object]);
    assert_eq!("container".parse::<RingType>().unwrap(), RingType::Container);
    assert!("proxy".parse::<RingType>().is_err());
    assert_eq!(RingType::Object.to_string(), "object");
}

#[test]
fn ring_type_names_and_builder_files() {
    let names: Vec<String> = RingType::ALL.iter().map(|ring| ring.builder_file()).collect();
    assert_eq!(names, vec!["account.builder", "container.builder", "object.builder"]);
    assert_eq!("container".parse::<RingType>().unwrap(), RingType::Container);
    assert!(matches!(
        "accounts".parse::<RingType>(),
        Err(RingError::InvalidField { .. })
    ));
}
