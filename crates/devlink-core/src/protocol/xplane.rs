//! X-Plane `DATA` datagram decoding.
//!
//! A simulator sends its telemetry as UDP datagrams of this shape:
//! ```text
//! ["DATA":4][index:1] { [block_id:i32][value:f32 × 8] }*
//! ```
//! Each 36-byte record is one data block; the 8 values are the block's slots.
//! A slot the simulator does not fill carries [`XPLANE_UNUSED_VALUE`].

use crate::protocol::codec::{read_f32, read_i32, ProtocolError};

/// Magic bytes at the start of every datagram.
pub const XPLANE_DATA_MAGIC: &[u8; 4] = b"DATA";

/// Magic plus the index byte.
pub const XPLANE_HEADER_LEN: usize = 5;

/// Number of values carried by one data block.
pub const XPLANE_DATA_BLOCK_ELEMENT_COUNT: usize = 8;

/// Exclusive upper bound on block ids the host maps.
pub const XPLANE_MAX_BLOCK_ID: usize = 200;

/// Size of one block record: the id plus its values.
pub const XPLANE_RECORD_LEN: usize = 4 + 4 * XPLANE_DATA_BLOCK_ELEMENT_COUNT;

/// Marker the simulator writes into slots it does not use.
pub const XPLANE_UNUSED_VALUE: f32 = -999.0;

/// One decoded data block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataBlock {
    pub block_id: i32,
    pub values: [f32; XPLANE_DATA_BLOCK_ELEMENT_COUNT],
}

impl DataBlock {
    /// Iterates `(block_index, value)` over the slots the simulator filled.
    pub fn used_values(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, v)| v != XPLANE_UNUSED_VALUE)
    }
}

/// Decodes every block in a `DATA` datagram.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] when the magic is missing or
/// the body is not a whole number of records.
pub fn decode_data_packet(bytes: &[u8]) -> Result<Vec<DataBlock>, ProtocolError> {
    if bytes.len() < XPLANE_HEADER_LEN || !bytes.starts_with(XPLANE_DATA_MAGIC) {
        return Err(ProtocolError::MalformedPayload(
            "not an X-Plane DATA datagram".to_string(),
        ));
    }

    let body = &bytes[XPLANE_HEADER_LEN..];
    if body.len() % XPLANE_RECORD_LEN != 0 {
        return Err(ProtocolError::MalformedPayload(format!(
            "DATA body of {} bytes is not a multiple of {XPLANE_RECORD_LEN}",
            body.len()
        )));
    }

    body.chunks_exact(XPLANE_RECORD_LEN)
        .map(|record| {
            let block_id = read_i32(record, 0)?;
            let mut values = [0f32; XPLANE_DATA_BLOCK_ELEMENT_COUNT];
            for (i, value) in values.iter_mut().enumerate() {
                *value = read_f32(record, 4 + i * 4)?;
            }
            Ok(DataBlock { block_id, values })
        })
        .collect()
}

/// Builds a `DATA` datagram.  Used by replay tooling and tests.
pub fn encode_data_packet(blocks: &[DataBlock]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(XPLANE_HEADER_LEN + blocks.len() * XPLANE_RECORD_LEN);
    buf.extend_from_slice(XPLANE_DATA_MAGIC);
    buf.push(b'0');
    for block in blocks {
        buf.extend_from_slice(&block.block_id.to_le_bytes());
        for value in &block.values {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(block_id: i32, first: f32) -> DataBlock {
        let mut values = [XPLANE_UNUSED_VALUE; XPLANE_DATA_BLOCK_ELEMENT_COUNT];
        values[0] = first;
        DataBlock { block_id, values }
    }

    #[test]
    fn test_decode_two_blocks() {
        // Arrange
        let bytes = encode_data_packet(&[block(3, 121.5), block(17, -4.25)]);

        // Act
        let blocks = decode_data_packet(&bytes).expect("decode");

        // Assert
        assert_eq!(bytes.len(), XPLANE_HEADER_LEN + 2 * XPLANE_RECORD_LEN);
        assert_eq!(blocks, vec![block(3, 121.5), block(17, -4.25)]);
    }

    #[test]
    fn test_decode_header_only_yields_no_blocks() {
        assert_eq!(decode_data_packet(b"DATA0").unwrap(), Vec::new());
    }

    #[test]
    fn test_decode_rejects_wrong_magic() {
        assert!(matches!(
            decode_data_packet(b"RREF0"),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let mut bytes = encode_data_packet(&[block(1, 1.0)]);
        bytes.pop();
        assert!(matches!(
            decode_data_packet(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_used_values_skips_unused_marker() {
        let mut b = block(5, 10.0);
        b.values[6] = 0.5;
        let used: Vec<_> = b.used_values().collect();
        assert_eq!(used, vec![(0, 10.0), (6, 0.5)]);
    }
}
