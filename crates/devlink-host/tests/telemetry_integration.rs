//! Integration tests for telemetry routing.
//!
//! The schema is loaded from a TOML file on disk, exactly as the host does at
//! startup, and real `DATA` datagrams are routed into a map-backed store.

use std::collections::BTreeMap;

use devlink_core::protocol::xplane::{encode_data_packet, DataBlock, XPLANE_UNUSED_VALUE};
use devlink_host::application::telemetry::TelemetryRouter;
use devlink_host::infrastructure::storage::schema::load_schema;
use tempfile::tempdir;

const SCHEMA: &str = r#"
[[class]]
name = "Speeds"

[[class.member]]
name = "indicated"
block_id = 3
block_index = 0

[[class.member]]
name = "true_airspeed"
block_id = 3
block_index = 2

[[class]]
name = "Engine"

[[class.member]]
name = "label"

[[class.member]]
name = "rpm"
block_id = 37
block_index = 0
"#;

fn router() -> (TelemetryRouter, devlink_core::TelemetrySchema) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(&path, SCHEMA).unwrap();
    let schema = load_schema(&path).unwrap();
    (TelemetryRouter::from_schema(&schema), schema)
}

#[test]
fn test_datagram_values_reach_their_members() {
    // Arrange
    let (router, schema) = router();
    let mut speeds = [XPLANE_UNUSED_VALUE; 8];
    speeds[0] = 110.0;
    speeds[2] = 118.5;
    let mut engine = [XPLANE_UNUSED_VALUE; 8];
    engine[0] = 2350.0;
    let datagram = encode_data_packet(&[
        DataBlock { block_id: 3, values: speeds },
        DataBlock { block_id: 37, values: engine },
    ]);
    let mut store = BTreeMap::new();

    // Act
    let routed = router.route_datagram(&datagram, &mut store).unwrap();

    // Assert
    assert_eq!(routed, 3);
    let named: BTreeMap<String, f32> = store
        .iter()
        .map(|(&(c, m), &v)| (schema.qualified_name(c, m).unwrap(), v))
        .collect();
    assert_eq!(named["Speeds.indicated"], 110.0);
    assert_eq!(named["Speeds.true_airspeed"], 118.5);
    assert_eq!(named["Engine.rpm"], 2350.0);
}

#[test]
fn test_unbound_blocks_are_ignored() {
    let (router, _) = router();
    let datagram = encode_data_packet(&[DataBlock {
        block_id: 99,
        values: [1.0; 8],
    }]);
    let mut store = BTreeMap::new();

    let routed = router.route_datagram(&datagram, &mut store).unwrap();

    assert_eq!(routed, 0);
    assert!(store.is_empty());
}

#[test]
fn test_members_without_binding_are_not_in_the_table() {
    let (router, _) = router();
    assert_eq!(router.table().bound_count(), 3);
}
