//! The packet catalog shared by host and device.
//!
//! Every packet is a fixed-layout record behind a common 3-byte envelope and
//! followed by a 2-byte checksum:
//! ```text
//! [length:1][type:1][counter:1][payload:N][checksum:2]
//! ```
//! `length` counts the whole packet, checksum included, so
//! `length == ENVELOPE_LEN + N + CHECKSUM_LEN` and a packet is never longer
//! than 255 bytes.  Multi-byte integers are little-endian; there is no padding.
//!
//! # Packet type byte
//!
//! ```text
//!  bit 7    bits 5-4   bit 3     bits 2-0
//! [system] [class]    [request] [ordinal]
//! ```
//! A response carries the base value of its type, a request the base value
//! plus the request bit: `FileInfo` is 0x21, so a `FileInfoRequest` is 0x29
//! and a `FileInfoResponse` is 0x21.

use crate::domain::hash::FileHash;
use crate::protocol::checksum::CHECKSUM_LEN;
use crate::protocol::codec::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the `length`/`type`/`counter` envelope.
pub const ENVELOPE_LEN: usize = 3;

/// Largest packet the one-byte `length` field can describe.
pub const MAX_PACKET_LEN: usize = u8::MAX as usize;

/// Largest type-specific payload that fits in one packet.
pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_LEN - ENVELOPE_LEN - CHECKSUM_LEN;

/// Size of the `file_id` + `offset` header in front of file data.
pub const FILE_DATA_HEADER_LEN: usize = 5;

/// Most file bytes a single `FileDataResponse` can carry.
pub const MAX_FILE_DATA_CHUNK: usize = MAX_PAYLOAD_LEN - FILE_DATA_HEADER_LEN;

/// Width of the NUL-terminated name in identity records.
pub const IDENTITY_NAME_LEN: usize = 16;

/// Width of the NUL-terminated internal file name in `FileInfoRequest`.
pub const FILE_NAME_LEN: usize = 32;

// ── Packet type ───────────────────────────────────────────────────────────────

/// Traffic class encoded in bits 4–5 of the packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketClass {
    Comm = 0x10,
    File = 0x20,
    Config = 0x30,
}

/// The raw packet type byte with accessors for its bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(pub u8);

impl PacketType {
    /// Set on packets handled by the device's system layer.
    pub const SYSTEM_BIT: u8 = 0x80;
    /// Set on host→device requests, clear on device→host responses.
    pub const REQUEST_BIT: u8 = 0x08;
    pub const CLASS_MASK: u8 = 0x30;
    pub const ORDINAL_MASK: u8 = 0x07;

    pub const HEARTBEAT: PacketType = PacketType(PacketClass::Comm as u8 | 1);
    pub const IDENTIFY: PacketType = PacketType(PacketClass::Comm as u8 | 2);
    pub const FILE_INFO: PacketType = PacketType(PacketClass::File as u8 | 1);
    pub const FILE_DATA: PacketType = PacketType(PacketClass::File as u8 | 2);

    /// The request variant of this type.
    pub const fn request(self) -> PacketType {
        PacketType(self.0 | Self::REQUEST_BIT)
    }

    /// The response variant of this type (the base value).
    pub const fn response(self) -> PacketType {
        PacketType(self.0 & !Self::REQUEST_BIT)
    }

    pub fn is_system(self) -> bool {
        self.0 & Self::SYSTEM_BIT != 0
    }

    pub fn is_request(self) -> bool {
        self.0 & Self::REQUEST_BIT != 0
    }

    /// The traffic class, or `None` when bits 4–5 are both clear.
    pub fn class(self) -> Option<PacketClass> {
        match self.0 & Self::CLASS_MASK {
            0x10 => Some(PacketClass::Comm),
            0x20 => Some(PacketClass::File),
            0x30 => Some(PacketClass::Config),
            _ => None,
        }
    }

    /// Position of the type within its class.
    pub fn ordinal(self) -> u8 {
        self.0 & Self::ORDINAL_MASK
    }
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        PacketType(value)
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Common header in front of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    /// Total packet length, checksum included.
    pub length: u8,
    pub packet_type: PacketType,
    /// Sender-assigned sequence/ack counter.
    pub counter: u8,
}

impl Envelope {
    /// Number of payload bytes implied by `length`, or `None` if `length` is
    /// too small to hold the envelope and checksum.
    pub fn payload_len(&self) -> Option<usize> {
        (self.length as usize).checked_sub(ENVELOPE_LEN + CHECKSUM_LEN)
    }
}

// ── Fixed-width names ─────────────────────────────────────────────────────────

/// An ASCII string stored in an `N`-byte, NUL-terminated wire field.
///
/// Construction fails instead of truncating: the string plus its terminator
/// must fit, so at most `N - 1` bytes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FixedName<const N: usize>(String);

impl<const N: usize> FixedName<N> {
    /// Validates `name` for an `N`-byte field.
    pub fn new(name: &str) -> Result<Self, ProtocolError> {
        if !name.is_ascii() {
            return Err(ProtocolError::NonAsciiName(name.to_string()));
        }
        if name.len() + 1 > N {
            return Err(ProtocolError::NameTooLong {
                len: name.len(),
                max: N - 1,
            });
        }
        if name.contains('\0') {
            return Err(ProtocolError::MalformedPayload(
                "name contains an embedded NUL".to_string(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Writes exactly `N` bytes: the name, then NUL padding.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        let mut field = [0u8; N];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        buf.extend_from_slice(&field);
    }

    /// Reads an `N`-byte field, stopping at the first NUL.
    pub(crate) fn read_from(field: &[u8]) -> Result<Self, ProtocolError> {
        let field = &field[..N.min(field.len())];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let text = std::str::from_utf8(&field[..end])
            .map_err(|e| ProtocolError::MalformedPayload(format!("invalid name bytes: {e}")))?;
        Self::new(text)
    }
}

impl<const N: usize> std::fmt::Display for FixedName<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> TryFrom<&str> for FixedName<N> {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Name field of an identity record.
pub type IdentityName = FixedName<IDENTITY_NAME_LEN>;

/// Internal device-side file name.
pub type FileName = FixedName<FILE_NAME_LEN>;

// ── Per-packet records ────────────────────────────────────────────────────────

/// HEARTBEAT request (0x19): host clock, sent periodically to keep the link up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHeartbeat {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl HostHeartbeat {
    /// Builds the heartbeat for a UTC timestamp given in seconds since the
    /// Unix epoch.
    pub fn from_unix_secs(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;

        // Civil date from day count (proleptic Gregorian, eras of 400 years).
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        Self {
            year: u16::try_from(year).unwrap_or(u16::MAX),
            month: month as u8,
            day: day as u8,
            hour: (rem / 3_600) as u8,
            minute: (rem / 60 % 60) as u8,
            second: (rem % 60) as u8,
        }
    }
}

/// HEARTBEAT response (0x11): device liveness and load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHeartbeat {
    /// CPU load in percent.
    pub cpu_load: u8,
}

/// IDENTIFY request (0x1A) / response (0x12): who is on the other end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: IdentityName,
    /// Transport-specific address (IPv4 address, UART node id, USB serial).
    pub address: u32,
}

/// FILE_INFO request (0x29): asks for the metadata of one device file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfoRequest {
    pub name: FileName,
}

/// FILE_INFO response (0x21): metadata used to decide whether to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfoResponse {
    /// Handle used by the following data requests.
    pub file_id: u8,
    pub file_length: u32,
    pub hash: FileHash,
}

/// FILE_DATA request (0x2A): asks for `length` bytes starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDataRequest {
    pub file_id: u8,
    pub offset: u32,
    /// At most [`MAX_FILE_DATA_CHUNK`].
    pub length: u8,
}

/// FILE_DATA response (0x22): one chunk of file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDataResponse {
    pub file_id: u8,
    pub offset: u32,
    /// Chunk bytes; the count is implied by the envelope length.
    pub data: Vec<u8>,
}

// ── Top-level packet enum ─────────────────────────────────────────────────────

/// Every packet in the catalog, discriminated by direction and type.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    HeartbeatRequest(HostHeartbeat),
    HeartbeatResponse(DeviceHeartbeat),
    IdentifyRequest(Identity),
    IdentifyResponse(Identity),
    FileInfoRequest(FileInfoRequest),
    FileInfoResponse(FileInfoResponse),
    FileDataRequest(FileDataRequest),
    FileDataResponse(FileDataResponse),
    /// A type outside the catalog (config and system packets included); the
    /// payload is kept so callers can route it themselves.
    Unrecognized {
        packet_type: PacketType,
        payload: Vec<u8>,
    },
}

impl Packet {
    /// Returns the type byte this packet is sent with.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::HeartbeatRequest(_) => PacketType::HEARTBEAT.request(),
            Packet::HeartbeatResponse(_) => PacketType::HEARTBEAT.response(),
            Packet::IdentifyRequest(_) => PacketType::IDENTIFY.request(),
            Packet::IdentifyResponse(_) => PacketType::IDENTIFY.response(),
            Packet::FileInfoRequest(_) => PacketType::FILE_INFO.request(),
            Packet::FileInfoResponse(_) => PacketType::FILE_INFO.response(),
            Packet::FileDataRequest(_) => PacketType::FILE_DATA.request(),
            Packet::FileDataResponse(_) => PacketType::FILE_DATA.response(),
            Packet::Unrecognized { packet_type, .. } => *packet_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_and_response_values_follow_the_bitfield() {
        assert_eq!(PacketType::FILE_INFO.0, 0x21);
        assert_eq!(PacketType::FILE_INFO.request().0, 0x29);
        assert_eq!(PacketType::FILE_INFO.response().0, 0x21);
        assert_eq!(PacketType::HEARTBEAT.request().0, 0x19);
        assert_eq!(PacketType::IDENTIFY.response().0, 0x12);
        assert_eq!(PacketType::FILE_DATA.request().0, 0x2A);
    }

    #[test]
    fn test_packet_type_accessors() {
        let t = PacketType(0xA9);
        assert!(t.is_system());
        assert!(t.is_request());
        assert_eq!(t.class(), Some(PacketClass::File));
        assert_eq!(t.ordinal(), 1);
        assert_eq!(PacketType(0x05).class(), None);
        assert_eq!(PacketType(0x33).class(), Some(PacketClass::Config));
    }

    #[test]
    fn test_packet_type_display_is_hex() {
        assert_eq!(PacketType(0x2A).to_string(), "0x2A");
    }

    #[test]
    fn test_max_chunk_fills_a_packet_exactly() {
        assert_eq!(MAX_PAYLOAD_LEN, 250);
        assert_eq!(MAX_FILE_DATA_CHUNK, 245);
        assert_eq!(
            ENVELOPE_LEN + FILE_DATA_HEADER_LEN + MAX_FILE_DATA_CHUNK + CHECKSUM_LEN,
            MAX_PACKET_LEN
        );
    }

    #[test]
    fn test_envelope_payload_len() {
        let env = Envelope {
            length: 10,
            packet_type: PacketType::FILE_INFO,
            counter: 0,
        };
        assert_eq!(env.payload_len(), Some(5));
        let short = Envelope { length: 4, ..env };
        assert_eq!(short.payload_len(), None);
    }

    // ── FixedName ─────────────────────────────────────────────────────────────

    #[test]
    fn test_name_of_fifteen_bytes_fits_identity_field() {
        let name = IdentityName::new("abcdefghijklmno").expect("15 bytes + NUL fits");
        assert_eq!(name.as_str().len(), 15);
    }

    #[test]
    fn test_name_filling_whole_field_is_rejected() {
        let result = IdentityName::new("abcdefghijklmnop");
        assert_eq!(result, Err(ProtocolError::NameTooLong { len: 16, max: 15 }));
    }

    #[test]
    fn test_file_name_guard_uses_32_byte_field() {
        assert!(FileName::new(&"f".repeat(31)).is_ok());
        assert!(matches!(
            FileName::new(&"f".repeat(32)),
            Err(ProtocolError::NameTooLong { len: 32, max: 31 })
        ));
    }

    #[test]
    fn test_non_ascii_name_is_rejected() {
        assert!(matches!(
            IdentityName::new("gerät"),
            Err(ProtocolError::NonAsciiName(_))
        ));
    }

    #[test]
    fn test_name_is_nul_padded_on_the_wire() {
        let mut buf = Vec::new();
        IdentityName::new("pump").unwrap().write_to(&mut buf);
        assert_eq!(buf.len(), IDENTITY_NAME_LEN);
        assert_eq!(&buf[..5], b"pump\0");
        assert!(buf[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_name_read_stops_at_first_nul() {
        let mut field = [0u8; IDENTITY_NAME_LEN];
        field[..3].copy_from_slice(b"abc");
        field[4..6].copy_from_slice(b"zz"); // garbage after the terminator
        let name = IdentityName::read_from(&field).unwrap();
        assert_eq!(name.as_str(), "abc");
    }

    #[test]
    fn test_name_read_without_terminator_is_rejected() {
        let field = [b'a'; IDENTITY_NAME_LEN];
        assert!(matches!(
            IdentityName::read_from(&field),
            Err(ProtocolError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_heartbeat_from_unix_secs() {
        // 2024-02-29T13:45:30Z
        let hb = HostHeartbeat::from_unix_secs(1_709_214_330);
        assert_eq!(
            (hb.year, hb.month, hb.day, hb.hour, hb.minute, hb.second),
            (2024, 2, 29, 13, 45, 30)
        );
        let epoch = HostHeartbeat::from_unix_secs(0);
        assert_eq!((epoch.year, epoch.month, epoch.day), (1970, 1, 1));
    }
}
