//! Packet conversion table: simulator block slots → value store positions.
//!
//! # Why a dense table? (for beginners)
//!
//! Telemetry arrives many times per second and every block carries 8 slots.
//! Looking each slot up by walking the schema would repeat the same search on
//! every datagram.  Instead the schema is walked once, when it is loaded, and
//! the answers are written into a flat `200 × 8` array indexed by
//! `block_id * 8 + block_index`.  A lookup is then one bounds check and one
//! array read.
//!
//! Slots nobody asked for stay `None`, which is how "unbound" is represented;
//! there is no magic sentinel number.

use tracing::{debug, warn};

use crate::domain::schema::TelemetrySchema;
use crate::protocol::xplane::{XPLANE_DATA_BLOCK_ELEMENT_COUNT, XPLANE_MAX_BLOCK_ID};

/// Total number of slots in a [`ConversionTable`].
pub const CONVERSION_TABLE_LEN: usize = XPLANE_MAX_BLOCK_ID * XPLANE_DATA_BLOCK_ELEMENT_COUNT;

/// Where a slot's value goes: the owning class and the member within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueBinding {
    pub class_index: usize,
    pub member_index: usize,
}

/// Dense map from `(block_id, block_index)` to a [`ValueBinding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTable {
    slots: Vec<Option<ValueBinding>>,
}

impl Default for ConversionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionTable {
    /// Creates a table with every slot unbound.
    pub fn new() -> Self {
        Self {
            slots: vec![None; CONVERSION_TABLE_LEN],
        }
    }

    /// Builds the table for `schema`.
    ///
    /// Only members that declare both `block_id` and `block_index` are bound.
    /// Declarations outside the table are skipped.  If two members claim the
    /// same slot, the one later in the schema wins.
    pub fn build(schema: &TelemetrySchema) -> Self {
        let mut table = Self::new();
        for (class_index, class) in schema.classes.iter().enumerate() {
            for (member_index, member) in class.members.iter().enumerate() {
                let (Some(block_id), Some(block_index)) = (member.block_id, member.block_index)
                else {
                    continue;
                };
                let binding = ValueBinding {
                    class_index,
                    member_index,
                };
                if !table.bind(block_id, block_index, binding) {
                    debug!(
                        class = %class.name,
                        member = %member.name,
                        block_id,
                        block_index,
                        "block slot out of range, member left unbound"
                    );
                }
            }
        }
        debug!(bound = table.bound_count(), "conversion table built");
        table
    }

    /// Binds one slot.  Returns `false` (and changes nothing) when the slot is
    /// out of range.
    pub fn bind(&mut self, block_id: i32, block_index: i32, binding: ValueBinding) -> bool {
        let Some(slot) = slot_index(block_id, block_index) else {
            return false;
        };
        if let Some(previous) = self.slots[slot].replace(binding) {
            if previous != binding {
                warn!(
                    block_id,
                    block_index,
                    ?previous,
                    ?binding,
                    "block slot claimed twice, later schema member wins"
                );
            }
        }
        true
    }

    /// Returns the binding for a slot, or `None` when the slot is unbound or
    /// outside the table.
    pub fn lookup(&self, block_id: i32, block_index: i32) -> Option<ValueBinding> {
        slot_index(block_id, block_index).and_then(|slot| self.slots[slot])
    }

    /// Number of bound slots.
    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

fn slot_index(block_id: i32, block_index: i32) -> Option<usize> {
    let block_id = usize::try_from(block_id).ok()?;
    let block_index = usize::try_from(block_index).ok()?;
    if block_id >= XPLANE_MAX_BLOCK_ID || block_index >= XPLANE_DATA_BLOCK_ELEMENT_COUNT {
        return None;
    }
    Some(block_id * XPLANE_DATA_BLOCK_ELEMENT_COUNT + block_index)
}
