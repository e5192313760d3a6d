//! Use case: route simulator data blocks into the host's value store.
//!
//! A flight simulator streams `DATA` datagrams; each holds blocks of eight
//! floats.  The [`ConversionTable`] says which schema member, if any, each
//! `(block_id, block_index)` slot feeds.  The router walks the blocks and
//! hands every bound, used value to a [`ValueStore`].

use std::collections::BTreeMap;

use devlink_core::protocol::xplane::{decode_data_packet, DataBlock};
use devlink_core::{ConversionTable, ProtocolError, TelemetrySchema};
use tracing::trace;

/// Receives routed values.
///
/// Implemented by whatever holds the live values (the realtime object
/// store in the full host, a map in tests and the CLI).
#[cfg_attr(test, mockall::automock)]
pub trait ValueStore {
    fn set_value(&mut self, class_index: usize, member_index: usize, value: f32);
}

impl ValueStore for BTreeMap<(usize, usize), f32> {
    fn set_value(&mut self, class_index: usize, member_index: usize, value: f32) {
        self.insert((class_index, member_index), value);
    }
}

/// Routes decoded blocks through a [`ConversionTable`].
#[derive(Debug, Clone, Default)]
pub struct TelemetryRouter {
    table: ConversionTable,
}

impl TelemetryRouter {
    pub fn new(table: ConversionTable) -> Self {
        Self { table }
    }

    pub fn from_schema(schema: &TelemetrySchema) -> Self {
        Self::new(ConversionTable::build(schema))
    }

    /// Stores every bound value in `blocks` and returns how many were stored.
    ///
    /// Unused slots (`-999.0`) and unbound slots are skipped, as are blocks
    /// whose id lies outside the table.
    pub fn route(&self, blocks: &[DataBlock], store: &mut dyn ValueStore) -> usize {
        let mut routed = 0;
        for block in blocks {
            for (block_index, value) in block.used_values() {
                let Some(binding) = self.table.lookup(block.block_id, block_index as i32) else {
                    continue;
                };
                trace!(
                    block_id = block.block_id,
                    block_index,
                    value,
                    class_index = binding.class_index,
                    member_index = binding.member_index,
                    "routing value"
                );
                store.set_value(binding.class_index, binding.member_index, value);
                routed += 1;
            }
        }
        routed
    }

    /// Decodes a raw `DATA` datagram and routes its blocks.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if the datagram is malformed;
    /// nothing is stored in that case.
    pub fn route_datagram(
        &self,
        datagram: &[u8],
        store: &mut dyn ValueStore,
    ) -> Result<usize, ProtocolError> {
        let blocks = decode_data_packet(datagram)?;
        Ok(self.route(&blocks, store))
    }

    pub fn table(&self) -> &ConversionTable {
        &self.table
    }
}
