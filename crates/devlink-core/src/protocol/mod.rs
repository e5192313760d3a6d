//! Protocol module containing the framing codec, packet types and the binary codec.
//!
//! Bytes flow through the layers in this order on receive:
//!
//! 1. [`slip`] finds frame boundaries in the raw transport stream.
//! 2. [`codec`] validates the envelope and checksum of one frame and turns the
//!    payload into a typed [`Packet`].
//!
//! Sending runs the same steps in reverse.

pub mod checksum;
pub mod codec;
pub mod messages;
pub mod sequence;
pub mod slip;
pub mod xplane;

pub use checksum::{ChecksumKind, Crc16CcittFalse, PacketChecksum, Unchecked};
pub use codec::{decode_packet, encode_packet, DecodedPacket, ProtocolError, WireRecord};
pub use messages::*;
pub use sequence::PacketCounter;
pub use slip::{FrameReader, InvalidEscapePolicy, SlipDecoder, SlipEncoder};
