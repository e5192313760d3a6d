//! Telemetry schema: the classes and members of the host's realtime value store.
//!
//! The schema is authored as TOML by whoever integrates a device:
//!
//! ```toml
//! [[class]]
//! name = "Speed"
//!
//! [[class.member]]
//! name = "indicated_airspeed"
//! block_id = 3
//! block_index = 0
//!
//! [[class.member]]
//! name = "target_speed"      # set by the device only, never from the simulator
//! ```
//!
//! A member tagged with both `block_id` and `block_index` receives the value at
//! that slot of every incoming simulator data block.  Positions in the schema
//! (class order, then member order within the class) are the indices the value
//! store is addressed by.

use serde::{Deserialize, Serialize};

/// The whole schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySchema {
    #[serde(default, rename = "class")]
    pub classes: Vec<SchemaClass>,
}

/// A named group of values (one "realtime object").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaClass {
    pub name: String,
    #[serde(default, rename = "member")]
    pub members: Vec<SchemaMember>,
}

/// One value inside a class, optionally fed from a simulator data block slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_index: Option<i32>,
}

impl TelemetrySchema {
    /// Returns the member at `(class_index, member_index)`, if any.
    pub fn member(&self, class_index: usize, member_index: usize) -> Option<&SchemaMember> {
        self.classes.get(class_index)?.members.get(member_index)
    }

    /// Returns `"Class.member"` for log output, or `None` for an unknown position.
    pub fn qualified_name(&self, class_index: usize, member_index: usize) -> Option<String> {
        let class = self.classes.get(class_index)?;
        let member = class.members.get(member_index)?;
        Some(format!("{}.{}", class.name, member.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
        [[class]]
        name = "Speed"

        [[class.member]]
        name = "indicated"
        block_id = 3
        block_index = 0

        [[class.member]]
        name = "target"

        [[class]]
        name = "Empty"
    "#;

    #[test]
    fn test_schema_parses_classes_and_optional_tags() {
        // Act
        let schema: TelemetrySchema = toml::from_str(SCHEMA).expect("valid schema");

        // Assert
        assert_eq!(schema.classes.len(), 2);
        let indicated = schema.member(0, 0).unwrap();
        assert_eq!(indicated.block_id, Some(3));
        assert_eq!(indicated.block_index, Some(0));
        let target = schema.member(0, 1).unwrap();
        assert_eq!(target.block_id, None);
        assert!(schema.classes[1].members.is_empty());
    }

    #[test]
    fn test_empty_document_is_empty_schema() {
        let schema: TelemetrySchema = toml::from_str("").unwrap();
        assert_eq!(schema, TelemetrySchema::default());
    }

    #[test]
    fn test_qualified_name() {
        let schema: TelemetrySchema = toml::from_str(SCHEMA).unwrap();
        assert_eq!(schema.qualified_name(0, 1).as_deref(), Some("Speed.target"));
        assert_eq!(schema.qualified_name(1, 0), None);
        assert_eq!(schema.qualified_name(9, 0), None);
    }
}
