//! Use case: turn a transport's byte stream into packets and back.
//!
//! Every transport (a UDP socket, a serial port, a USB endpoint) owns exactly
//! one [`DeviceLink`].  The link keeps the framing state that must survive
//! between reads, the counter stamped into outgoing packets, and the checksum
//! the device firmware expects.
//!
//! # Why one link per transport? (for beginners)
//!
//! The frame decoder is a state machine: half a frame may arrive in one read
//! and the rest in the next.  If two transports fed the same decoder, the
//! bytes of their frames would interleave and both streams would be corrupted.
//! Owning one `DeviceLink` per transport makes that mistake impossible.

use std::fmt;

use devlink_core::protocol::messages::MAX_PACKET_LEN;
use devlink_core::protocol::slip::encode_frame;
use devlink_core::protocol::{
    decode_packet, encode_packet, ChecksumKind, DecodedPacket, FrameReader, InvalidEscapePolicy,
    Packet, PacketChecksum, PacketCounter, ProtocolError,
};
use tracing::{debug, warn};

use crate::infrastructure::storage::config::LinkSection;

/// Protocol settings for one link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkConfig {
    pub checksum: ChecksumKind,
    pub invalid_escape: InvalidEscapePolicy,
}

impl From<&LinkSection> for LinkConfig {
    fn from(section: &LinkSection) -> Self {
        Self {
            checksum: section.checksum,
            invalid_escape: section.invalid_escape,
        }
    }
}

/// Framing, counter and checksum state of one device connection.
pub struct DeviceLink {
    reader: FrameReader,
    counter: PacketCounter,
    checksum: Box<dyn PacketChecksum>,
    config: LinkConfig,
}

impl fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceLink")
            .field("config", &self.config)
            .field("counter", &self.counter)
            .field("decoder_state", &self.reader.state())
            .finish()
    }
}

impl DeviceLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            reader: FrameReader::new(MAX_PACKET_LEN, config.invalid_escape),
            counter: PacketCounter::new(),
            checksum: config.checksum.build(),
            config,
        }
    }

    /// Feeds bytes read from the transport and returns one result per frame
    /// completed by them, oldest first.
    ///
    /// A frame that fails to decode yields an `Err` in its position; the
    /// frames after it are still decoded.
    pub fn receive(&mut self, bytes: &[u8]) -> Vec<Result<DecodedPacket, ProtocolError>> {
        self.reader
            .push(bytes)
            .into_iter()
            .map(|frame| {
                let result = decode_packet(&frame, self.checksum.as_ref());
                match &result {
                    Ok(decoded) => {
                        debug!(
                            packet_type = %decoded.envelope.packet_type,
                            counter = decoded.envelope.counter,
                            len = decoded.consumed,
                            "packet received"
                        );
                        if decoded.consumed < frame.len() {
                            debug!(
                                extra = frame.len() - decoded.consumed,
                                "ignoring bytes after packet in frame"
                            );
                        }
                    }
                    Err(e) => warn!(error = %e, frame_len = frame.len(), "dropping undecodable frame"),
                }
                result
            })
            .collect()
    }

    /// Encodes `packet` with the next counter value and frames it for the wire.
    ///
    /// The frame carries both a leading and a trailing `END`, so the device
    /// resynchronises even if it saw line noise before this frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the packet cannot be encoded.  The counter
    /// value drawn for it is not reused.
    pub fn send(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        let counter = self.counter.next();
        let bytes = encode_packet(packet, counter, self.checksum.as_ref())?;
        debug!(
            packet_type = %packet.packet_type(),
            counter,
            len = bytes.len(),
            "packet sent"
        );
        Ok(encode_frame(&bytes))
    }

    /// Drops any partial frame, e.g. after the transport reconnects.
    pub fn reset(&mut self) {
        self.reader.reset();
    }

    pub fn config(&self) -> LinkConfig {
        self.config
    }
}
