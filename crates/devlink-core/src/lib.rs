//! # devlink-core
//!
//! Shared library for DevLink containing the framing codec, the packet
//! catalog and its binary codec, content hashing, and the telemetry conversion
//! table.
//!
//! It has no transports or UI frameworks; the only OS access is reading a
//! file to hash it.
//!
//! # Architecture overview (for beginners)
//!
//! DevLink connects a desktop host to small embedded devices (cockpit panels,
//! instrument displays) over UDP, UART or USB.  All three transports carry the
//! same byte stream, so everything protocol-related lives here, below any
//! transport:
//!
//! - **`protocol`** – How bytes travel.  Packets are framed with SLIP so the
//!   receiver can find their boundaries in a continuous stream, and each frame
//!   holds a compact packed record: a 3-byte envelope, a type-specific payload
//!   and a 2-byte checksum.
//!
//! - **`domain`** – Pure logic with no I/O: the [`FileHash`] used to decide
//!   whether a cached device file is still current, the telemetry schema, and
//!   the [`ConversionTable`] that routes simulator values into the host's
//!   value store.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `devlink_core::FileHash` instead of `devlink_core::domain::hash::FileHash`.
pub use domain::conversion::{ConversionTable, ValueBinding};
pub use domain::hash::{FileHash, HashError};
pub use domain::schema::TelemetrySchema;
pub use protocol::codec::{decode_packet, encode_packet, DecodedPacket, ProtocolError};
pub use protocol::messages::Packet;
