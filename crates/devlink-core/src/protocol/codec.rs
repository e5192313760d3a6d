//! Binary codec for encoding and decoding DevLink packets.
//!
//! Wire format (inside one SLIP frame):
//! ```text
//! [length:1][type:1][counter:1][payload:N][checksum:2]
//! ```
//! `length` covers the whole packet.  All multi-byte integers are
//! little-endian and records are packed field by field; nothing here relies on
//! in-memory struct layout.
//!
//! # Why not just `transmute` the struct? (for beginners)
//!
//! The device firmware is written against packed C structs, so it is tempting
//! to reinterpret a Rust struct's bytes directly.  That would make the wire
//! format depend on the host compiler's padding rules and CPU byte order.
//! Writing each field explicitly with `to_le_bytes` keeps the format identical
//! on every host and makes every offset visible in the code below.

use thiserror::Error;
use tracing::debug;

use crate::domain::hash::{FileHash, HashError, HASH_LEN};
use crate::protocol::checksum::{PacketChecksum, CHECKSUM_LEN};
use crate::protocol::messages::{
    DeviceHeartbeat, Envelope, FileDataRequest, FileDataResponse, FileInfoRequest,
    FileInfoResponse, FileName, HostHeartbeat, Identity, IdentityName, Packet, PacketType,
    ENVELOPE_LEN, FILE_DATA_HEADER_LEN, FILE_NAME_LEN, IDENTITY_NAME_LEN, MAX_FILE_DATA_CHUNK,
    MAX_PACKET_LEN,
};

/// Errors that can occur during packet encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the record or packet it should hold.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The envelope `length` is too small to hold the envelope and checksum.
    #[error("invalid packet length field: {0}")]
    InvalidLength(u8),

    /// The trailing checksum does not match the packet contents.
    #[error("checksum mismatch: computed 0x{expected:04X}, packet carries 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// The encoded packet would not fit the one-byte length field.
    #[error("packet of {len} bytes exceeds the {MAX_PACKET_LEN}-byte limit")]
    PacketTooLarge { len: usize },

    /// A file data chunk is larger than one packet can carry.
    #[error("file data chunk of {len} bytes exceeds the {max}-byte limit")]
    ChunkTooLarge { len: usize, max: usize },

    /// A name does not fit its fixed-width field with its NUL terminator.
    #[error("name of {len} bytes exceeds the {max}-byte limit")]
    NameTooLong { len: usize, max: usize },

    /// A name contains non-ASCII characters.
    #[error("name is not ASCII: {0:?}")]
    NonAsciiName(String),

    /// The payload could not be parsed (too short for its type, bad name bytes, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ProtocolError {
    /// Returns `true` when more bytes may turn this failure into a success.
    ///
    /// Stream readers use this to tell "wait for the rest of the packet" apart
    /// from errors that will never go away.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::InsufficientData { .. })
    }
}

// ── Fixed-layout records ──────────────────────────────────────────────────────

/// A record with a fixed byte layout.
///
/// `write_to` appends exactly `WIRE_SIZE` bytes.  `read_from` reads the first
/// `WIRE_SIZE` bytes of its input and fails with
/// [`ProtocolError::InsufficientData`] when fewer are available.
pub trait WireRecord: Sized {
    const WIRE_SIZE: usize;

    fn write_to(&self, buf: &mut Vec<u8>);

    fn read_from(bytes: &[u8]) -> Result<Self, ProtocolError>;
}

impl WireRecord for Envelope {
    const WIRE_SIZE: usize = ENVELOPE_LEN;

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.length);
        buf.push(self.packet_type.0);
        buf.push(self.counter);
    }

    fn read_from(bytes: &[u8]) -> Result<Self, ProtocolError> {
        require_available(bytes, Self::WIRE_SIZE)?;
        Ok(Envelope {
            length: bytes[0],
            packet_type: PacketType(bytes[1]),
            counter: bytes[2],
        })
    }
}

impl WireRecord for HostHeartbeat {
    // 2 (year) + 5 × 1
    const WIRE_SIZE: usize = 7;

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.year.to_le_bytes());
        buf.push(self.month);
        buf.push(self.day);
        buf.push(self.hour);
        buf.push(self.minute);
        buf.push(self.second);
    }

    fn read_from(p: &[u8]) -> Result<Self, ProtocolError> {
        require_available(p, Self::WIRE_SIZE)?;
        Ok(HostHeartbeat {
            year: read_u16(p, 0)?,
            month: p[2],
            day: p[3],
            hour: p[4],
            minute: p[5],
            second: p[6],
        })
    }
}

impl WireRecord for DeviceHeartbeat {
    const WIRE_SIZE: usize = 1;

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.cpu_load);
    }

    fn read_from(p: &[u8]) -> Result<Self, ProtocolError> {
        require_available(p, Self::WIRE_SIZE)?;
        Ok(DeviceHeartbeat { cpu_load: p[0] })
    }
}

impl WireRecord for Identity {
    // 16 (name) + 4 (address)
    const WIRE_SIZE: usize = IDENTITY_NAME_LEN + 4;

    fn write_to(&self, buf: &mut Vec<u8>) {
        self.name.write_to(buf);
        buf.extend_from_slice(&self.address.to_le_bytes());
    }

    fn read_from(p: &[u8]) -> Result<Self, ProtocolError> {
        require_available(p, Self::WIRE_SIZE)?;
        Ok(Identity {
            name: IdentityName::read_from(&p[..IDENTITY_NAME_LEN])?,
            address: read_u32(p, IDENTITY_NAME_LEN)?,
        })
    }
}

impl WireRecord for FileInfoRequest {
    const WIRE_SIZE: usize = FILE_NAME_LEN;

    fn write_to(&self, buf: &mut Vec<u8>) {
        self.name.write_to(buf);
    }

    fn read_from(p: &[u8]) -> Result<Self, ProtocolError> {
        require_available(p, Self::WIRE_SIZE)?;
        Ok(FileInfoRequest {
            name: FileName::read_from(&p[..FILE_NAME_LEN])?,
        })
    }
}

impl WireRecord for FileInfoResponse {
    // 1 (file_id) + 4 (file_length) + 16 (hash)
    const WIRE_SIZE: usize = 1 + 4 + HASH_LEN;

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.file_id);
        buf.extend_from_slice(&self.file_length.to_le_bytes());
        buf.extend_from_slice(self.hash.as_bytes());
    }

    fn read_from(p: &[u8]) -> Result<Self, ProtocolError> {
        require_available(p, Self::WIRE_SIZE)?;
        Ok(FileInfoResponse {
            file_id: p[0],
            file_length: read_u32(p, 1)?,
            hash: FileHash::try_from(&p[5..5 + HASH_LEN])?,
        })
    }
}

impl WireRecord for FileDataRequest {
    // 1 (file_id) + 4 (offset) + 1 (length)
    const WIRE_SIZE: usize = FILE_DATA_HEADER_LEN + 1;

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.file_id);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.push(self.length);
    }

    fn read_from(p: &[u8]) -> Result<Self, ProtocolError> {
        require_available(p, Self::WIRE_SIZE)?;
        let length = p[5];
        check_chunk_len(length as usize)?;
        Ok(FileDataRequest {
            file_id: p[0],
            offset: read_u32(p, 1)?,
            length,
        })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// A packet decoded from the front of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub envelope: Envelope,
    pub packet: Packet,
    /// Bytes taken from the input (the envelope `length`).
    pub consumed: usize,
}

/// Encodes a [`Packet`] into a complete packet: envelope, payload, checksum.
///
/// The counter is **not** chosen here – pass the next value from the link's
/// [`crate::protocol::PacketCounter`].
///
/// # Errors
///
/// - [`ProtocolError::PacketTooLarge`] if the packet exceeds 255 bytes.
/// - [`ProtocolError::ChunkTooLarge`] for file data beyond one packet's capacity.
///
/// # Examples
///
/// ```rust
/// use devlink_core::protocol::{decode_packet, encode_packet, Crc16CcittFalse};
/// use devlink_core::protocol::messages::{DeviceHeartbeat, Packet};
///
/// let packet = Packet::HeartbeatResponse(DeviceHeartbeat { cpu_load: 12 });
/// let bytes = encode_packet(&packet, 7, &Crc16CcittFalse).unwrap();
/// let decoded = decode_packet(&bytes, &Crc16CcittFalse).unwrap();
/// assert_eq!(decoded.packet, packet);
/// assert_eq!(decoded.envelope.counter, 7);
/// assert_eq!(decoded.consumed, bytes.len());
/// ```
pub fn encode_packet(
    packet: &Packet,
    counter: u8,
    checksum: &dyn PacketChecksum,
) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = Vec::new();
    encode_payload(packet, &mut payload)?;

    let total = ENVELOPE_LEN + payload.len() + CHECKSUM_LEN;
    let length = u8::try_from(total).map_err(|_| ProtocolError::PacketTooLarge { len: total })?;

    let envelope = Envelope {
        length,
        packet_type: packet.packet_type(),
        counter,
    };

    let mut buf = Vec::with_capacity(total);
    envelope.write_to(&mut buf);
    buf.extend_from_slice(&payload);
    let sum = checksum.compute(&buf);
    buf.extend_from_slice(&sum.to_le_bytes());
    Ok(buf)
}

/// Decodes one packet from the beginning of `bytes`.
///
/// Bytes past the envelope `length` are left alone; the returned
/// [`DecodedPacket::consumed`] tells the caller where the next packet starts.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if the envelope or the full packet is
///   not available yet (see [`ProtocolError::is_incomplete`]).
/// - [`ProtocolError::InvalidLength`] if `length` is below 5.
/// - [`ProtocolError::ChecksumMismatch`] if `checksum` verifies and disagrees.
/// - [`ProtocolError::MalformedPayload`] if the payload is too short for its type.
pub fn decode_packet(
    bytes: &[u8],
    checksum: &dyn PacketChecksum,
) -> Result<DecodedPacket, ProtocolError> {
    let envelope = Envelope::read_from(bytes)?;

    let length = envelope.length as usize;
    if length < ENVELOPE_LEN + CHECKSUM_LEN {
        return Err(ProtocolError::InvalidLength(envelope.length));
    }
    require_available(bytes, length)?;

    let body_end = length - CHECKSUM_LEN;
    let actual = read_u16(bytes, body_end)?;
    if checksum.verifies() {
        let expected = checksum.compute(&bytes[..body_end]);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }
    }

    let packet = decode_payload(envelope.packet_type, &bytes[ENVELOPE_LEN..body_end])?;
    Ok(DecodedPacket {
        envelope,
        packet,
        consumed: length,
    })
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(packet: &Packet, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
    match packet {
        Packet::HeartbeatRequest(m) => m.write_to(buf),
        Packet::HeartbeatResponse(m) => m.write_to(buf),
        Packet::IdentifyRequest(m) | Packet::IdentifyResponse(m) => m.write_to(buf),
        Packet::FileInfoRequest(m) => m.write_to(buf),
        Packet::FileInfoResponse(m) => m.write_to(buf),
        Packet::FileDataRequest(m) => {
            check_chunk_len(m.length as usize)?;
            m.write_to(buf);
        }
        Packet::FileDataResponse(m) => encode_file_data_response(buf, m)?,
        Packet::Unrecognized { payload, .. } => buf.extend_from_slice(payload),
    }
    Ok(())
}

fn encode_file_data_response(
    buf: &mut Vec<u8>,
    m: &FileDataResponse,
) -> Result<(), ProtocolError> {
    check_chunk_len(m.data.len())?;
    buf.push(m.file_id);
    buf.extend_from_slice(&m.offset.to_le_bytes());
    buf.extend_from_slice(&m.data);
    Ok(())
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(packet_type: PacketType, payload: &[u8]) -> Result<Packet, ProtocolError> {
    let packet = match packet_type {
        t if t == PacketType::HEARTBEAT.request() => {
            Packet::HeartbeatRequest(decode_record(payload, "HeartbeatRequest")?)
        }
        t if t == PacketType::HEARTBEAT.response() => {
            Packet::HeartbeatResponse(decode_record(payload, "HeartbeatResponse")?)
        }
        t if t == PacketType::IDENTIFY.request() => {
            Packet::IdentifyRequest(decode_record(payload, "IdentifyRequest")?)
        }
        t if t == PacketType::IDENTIFY.response() => {
            Packet::IdentifyResponse(decode_record(payload, "IdentifyResponse")?)
        }
        t if t == PacketType::FILE_INFO.request() => {
            Packet::FileInfoRequest(decode_record(payload, "FileInfoRequest")?)
        }
        t if t == PacketType::FILE_INFO.response() => {
            Packet::FileInfoResponse(decode_record(payload, "FileInfoResponse")?)
        }
        t if t == PacketType::FILE_DATA.request() => {
            Packet::FileDataRequest(decode_record(payload, "FileDataRequest")?)
        }
        t if t == PacketType::FILE_DATA.response() => {
            Packet::FileDataResponse(decode_file_data_response(payload)?)
        }
        other => {
            debug!(packet_type = %other, len = payload.len(), "unrecognized packet type");
            Packet::Unrecognized {
                packet_type: other,
                payload: payload.to_vec(),
            }
        }
    };
    Ok(packet)
}

/// Decodes a fixed record that must fill (at least) the payload.
fn decode_record<T: WireRecord>(payload: &[u8], context: &str) -> Result<T, ProtocolError> {
    require_len(payload, T::WIRE_SIZE, context)?;
    if payload.len() > T::WIRE_SIZE {
        debug!(
            context,
            extra = payload.len() - T::WIRE_SIZE,
            "ignoring trailing payload bytes"
        );
    }
    T::read_from(payload)
}

fn decode_file_data_response(p: &[u8]) -> Result<FileDataResponse, ProtocolError> {
    require_len(p, FILE_DATA_HEADER_LEN, "FileDataResponse")?;
    Ok(FileDataResponse {
        file_id: p[0],
        offset: read_u32(p, 1)?,
        data: p[FILE_DATA_HEADER_LEN..].to_vec(),
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn check_chunk_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_FILE_DATA_CHUNK {
        Err(ProtocolError::ChunkTooLarge {
            len,
            max: MAX_FILE_DATA_CHUNK,
        })
    } else {
        Ok(())
    }
}

/// A complete packet whose payload is too short for its type is malformed,
/// not incomplete: more stream bytes will never fix it.
fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn require_available(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], ProtocolError> {
    let end = offset + N;
    require_available(buf, end)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..end]);
    Ok(out)
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ProtocolError> {
    read_array(buf, offset).map(u16::from_le_bytes)
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    read_array(buf, offset).map(u32::from_le_bytes)
}

pub(crate) fn read_i32(buf: &[u8], offset: usize) -> Result<i32, ProtocolError> {
    read_array(buf, offset).map(i32::from_le_bytes)
}

pub(crate) fn read_f32(buf: &[u8], offset: usize) -> Result<f32, ProtocolError> {
    read_array(buf, offset).map(f32::from_le_bytes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
