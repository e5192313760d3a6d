//! SLIP-style byte escaping used to frame packets on a raw byte stream.
//!
//! Wire format:
//! ```text
//! [END][escaped packet bytes...][END]
//! ```
//! Inside a frame, `END` (0xC0) is sent as `ESC ESC_END` (0xDB 0xDC) and
//! `ESC` (0xDB) is sent as `ESC ESC_ESC` (0xDB 0xDD).  Every other byte is
//! sent verbatim.
//!
//! # Why escape at all? (for beginners)
//!
//! UART and USB-CDC links deliver a continuous stream of bytes with no notion
//! of where one packet ends and the next begins, and a byte may be lost or
//! corrupted at any time.  Reserving one byte value as a frame boundary lets a
//! receiver that joins mid-stream (or loses sync) find the start of the next
//! packet by simply waiting for the next `END`.  Escaping guarantees that the
//! boundary value never appears *inside* a packet.
//!
//! # Cursors instead of allocations
//!
//! Both [`SlipEncoder::encode`] and [`SlipDecoder::decode`] work on
//! caller-owned buffers and advance caller-owned cursors.  When a destination
//! buffer fills up the call returns early and the cursors record exactly how
//! far it got, so the caller can hand in a fresh buffer and resume without
//! losing or duplicating a byte.  [`encode_frame`] and [`FrameReader`] wrap the
//! cursor API for callers that prefer owned `Vec`s.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Frame boundary marker.
pub const END: u8 = 0xC0;
/// Escape marker; the next byte is a substitute.
pub const ESC: u8 = 0xDB;
/// Substitute for an escaped `END`.
pub const ESC_END: u8 = 0xDC;
/// Substitute for an escaped `ESC`.
pub const ESC_ESC: u8 = 0xDD;

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Selects which boundary bytes the encoder wraps around a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBoundaries {
    /// Emit an `END` before the first payload byte.
    pub leading: bool,
    /// Emit an `END` after the last payload byte.
    pub trailing: bool,
}

impl FrameBoundaries {
    /// `END` on both sides; flushes any line noise before the frame.
    pub const BOTH: Self = Self {
        leading: true,
        trailing: true,
    };
    /// Classic RFC 1055 framing: only a closing `END`.
    pub const TRAILING_ONLY: Self = Self {
        leading: false,
        trailing: true,
    };
    /// No boundaries; used when a caller escapes a payload in several pieces.
    pub const NONE: Self = Self {
        leading: false,
        trailing: false,
    };
}

impl Default for FrameBoundaries {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Outcome of one [`SlipEncoder::encode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    /// Every source byte and every requested boundary has been written.
    Complete,
    /// The destination ran out of room; call again with more space.
    DestinationFull,
}

/// Resumable encoder for a single frame.
///
/// The encoder remembers whether it has already written the leading and
/// trailing boundaries, so resuming after [`EncodeStatus::DestinationFull`]
/// never writes them twice.  Create a new encoder (or call [`reset`]) for each
/// frame.
///
/// [`reset`]: SlipEncoder::reset
#[derive(Debug, Clone)]
pub struct SlipEncoder {
    boundaries: FrameBoundaries,
    leading_written: bool,
    trailing_written: bool,
}

impl SlipEncoder {
    /// Creates an encoder that wraps the payload in `boundaries`.
    pub fn new(boundaries: FrameBoundaries) -> Self {
        Self {
            boundaries,
            leading_written: false,
            trailing_written: false,
        }
    }

    /// Prepares the encoder for the next frame.
    pub fn reset(&mut self) {
        self.leading_written = false;
        self.trailing_written = false;
    }

    /// Escapes `src[*src_pos..]` into `dst[*dst_pos..]`.
    ///
    /// Both cursors are advanced by exactly the number of bytes consumed and
    /// produced.  An escape pair is never split across two destination
    /// buffers: if only one byte of room is left for a byte that needs
    /// escaping, that source byte stays unconsumed and the call returns
    /// [`EncodeStatus::DestinationFull`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use devlink_core::protocol::slip::{EncodeStatus, FrameBoundaries, SlipEncoder};
    ///
    /// let payload = [0x01, 0xC0, 0x02];
    /// let mut encoder = SlipEncoder::new(FrameBoundaries::BOTH);
    /// let mut out = [0u8; 16];
    /// let (mut src_pos, mut dst_pos) = (0, 0);
    ///
    /// let status = encoder.encode(&payload, &mut src_pos, &mut out, &mut dst_pos);
    ///
    /// assert_eq!(status, EncodeStatus::Complete);
    /// assert_eq!(&out[..dst_pos], &[0xC0, 0x01, 0xDB, 0xDC, 0x02, 0xC0]);
    /// ```
    pub fn encode(
        &mut self,
        src: &[u8],
        src_pos: &mut usize,
        dst: &mut [u8],
        dst_pos: &mut usize,
    ) -> EncodeStatus {
        if self.boundaries.leading && !self.leading_written {
            if *dst_pos >= dst.len() {
                return EncodeStatus::DestinationFull;
            }
            dst[*dst_pos] = END;
            *dst_pos += 1;
            self.leading_written = true;
        }

        while *src_pos < src.len() {
            let byte = src[*src_pos];
            let room = dst.len().saturating_sub(*dst_pos);
            match escape(byte) {
                Some(substitute) => {
                    if room < 2 {
                        return EncodeStatus::DestinationFull;
                    }
                    dst[*dst_pos] = ESC;
                    dst[*dst_pos + 1] = substitute;
                    *dst_pos += 2;
                }
                None => {
                    if room < 1 {
                        return EncodeStatus::DestinationFull;
                    }
                    dst[*dst_pos] = byte;
                    *dst_pos += 1;
                }
            }
            *src_pos += 1;
        }

        if self.boundaries.trailing && !self.trailing_written {
            if *dst_pos >= dst.len() {
                return EncodeStatus::DestinationFull;
            }
            dst[*dst_pos] = END;
            *dst_pos += 1;
            self.trailing_written = true;
        }

        EncodeStatus::Complete
    }
}

/// Returns the substitute byte for a reserved value, or `None` if `byte` is
/// sent verbatim.
fn escape(byte: u8) -> Option<u8> {
    match byte {
        END => Some(ESC_END),
        ESC => Some(ESC_ESC),
        _ => None,
    }
}

/// Number of bytes `payload` occupies once escaped, excluding boundaries.
pub fn escaped_len(payload: &[u8]) -> usize {
    payload
        .iter()
        .map(|&b| if escape(b).is_some() { 2 } else { 1 })
        .sum()
}

/// Escapes `payload` into a new, fully delimited frame (`END ... END`).
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; escaped_len(payload) + 2];
    let mut encoder = SlipEncoder::new(FrameBoundaries::BOTH);
    let (mut src_pos, mut dst_pos) = (0, 0);
    let status = encoder.encode(payload, &mut src_pos, &mut out, &mut dst_pos);
    debug_assert_eq!(status, EncodeStatus::Complete);
    out.truncate(dst_pos);
    out
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// The decoder's position relative to frame boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for an `END` that opens a frame; other bytes are discarded.
    NoFrame,
    /// Copying payload bytes.
    InFrame,
    /// The previous byte was `ESC`; the next byte is a substitute.
    Escaped,
}

/// What the decoder does with an `ESC` followed by something other than
/// `ESC_END` or `ESC_ESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidEscapePolicy {
    /// Copy the byte after `ESC` into the payload unchanged.
    #[default]
    PassThrough,
    /// Report [`DecodeStatus::InvalidEscape`] and drop the frame.  An `END`
    /// after the `ESC` is not consumed, so it still opens the next frame.
    Reject,
}

/// Outcome of one [`SlipDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A frame was closed; `dst[..*dst_pos]` holds its payload.
    FrameComplete,
    /// The source is exhausted and no frame has been closed yet.
    NeedMoreData,
    /// The destination has no room for the next payload byte.  The byte was
    /// not consumed.
    DestinationFull,
    /// An invalid escape continuation was seen under
    /// [`InvalidEscapePolicy::Reject`]; the decoder is back in
    /// [`DecoderState::NoFrame`].
    InvalidEscape(u8),
}

/// Stateful SLIP decoder for one logical byte stream.
///
/// Feed it chunks of any size; the state carries across calls.  One decoder
/// must never be shared between unrelated streams: every UART, UDP or USB link
/// owns its own instance.
///
/// # Cursor contract
///
/// After [`DecodeStatus::FrameComplete`] the caller consumes
/// `dst[..*dst_pos]` and sets `*dst_pos = 0` before the next call.  When a
/// new frame opens from [`DecoderState::NoFrame`] the decoder itself rewinds
/// `*dst_pos` to 0, discarding any partial frame left over from a reset.
///
/// # Examples
///
/// ```rust
/// use devlink_core::protocol::slip::{encode_frame, DecodeStatus, SlipDecoder};
///
/// let wire = encode_frame(&[0xC0, 0x42]);
/// let mut decoder = SlipDecoder::new();
/// let mut out = [0u8; 8];
/// let (mut src_pos, mut dst_pos) = (0, 0);
///
/// assert_eq!(
///     decoder.decode(&wire, &mut src_pos, &mut out, &mut dst_pos),
///     DecodeStatus::FrameComplete
/// );
/// assert_eq!(&out[..dst_pos], &[0xC0, 0x42]);
/// ```
#[derive(Debug, Clone)]
pub struct SlipDecoder {
    state: DecoderState,
    policy: InvalidEscapePolicy,
}

impl SlipDecoder {
    /// Creates a decoder awaiting a frame start, passing invalid escapes through.
    pub fn new() -> Self {
        Self::with_policy(InvalidEscapePolicy::default())
    }

    /// Creates a decoder with an explicit invalid-escape policy.
    pub fn with_policy(policy: InvalidEscapePolicy) -> Self {
        Self {
            state: DecoderState::NoFrame,
            policy,
        }
    }

    /// Current state of the frame state machine.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Forces the decoder back to [`DecoderState::NoFrame`].
    ///
    /// Call after a protocol error or a transport reconnect so a half-received
    /// frame is not glued to the next one.
    pub fn reset(&mut self) {
        self.state = DecoderState::NoFrame;
    }

    /// Decodes bytes from `src[*src_pos..]` into `dst[*dst_pos..]` until a
    /// frame closes, the source runs out, or the destination fills up.
    ///
    /// An `END` while in a frame closes it.  Empty frames (`END END`) are
    /// skipped, so a single `END` may both close one frame and open the next.
    pub fn decode(
        &mut self,
        src: &[u8],
        src_pos: &mut usize,
        dst: &mut [u8],
        dst_pos: &mut usize,
    ) -> DecodeStatus {
        while *src_pos < src.len() {
            let byte = src[*src_pos];
            match self.state {
                DecoderState::NoFrame => {
                    *src_pos += 1;
                    if byte == END {
                        self.state = DecoderState::InFrame;
                        *dst_pos = 0;
                    }
                }
                DecoderState::InFrame => match byte {
                    END => {
                        *src_pos += 1;
                        if *dst_pos > 0 {
                            return DecodeStatus::FrameComplete;
                        }
                    }
                    ESC => {
                        *src_pos += 1;
                        self.state = DecoderState::Escaped;
                    }
                    _ => {
                        if *dst_pos >= dst.len() {
                            return DecodeStatus::DestinationFull;
                        }
                        dst[*dst_pos] = byte;
                        *dst_pos += 1;
                        *src_pos += 1;
                    }
                },
                DecoderState::Escaped => {
                    let decoded = match (byte, self.policy) {
                        (ESC_END, _) => END,
                        (ESC_ESC, _) => ESC,
                        (other, InvalidEscapePolicy::PassThrough) => {
                            debug!(byte = other, "invalid escape continuation passed through");
                            other
                        }
                        (other, InvalidEscapePolicy::Reject) => {
                            // An END here is the next frame's boundary; leave it
                            // for NoFrame to read.
                            if other != END {
                                *src_pos += 1;
                            }
                            self.state = DecoderState::NoFrame;
                            return DecodeStatus::InvalidEscape(other);
                        }
                    };
                    if *dst_pos >= dst.len() {
                        return DecodeStatus::DestinationFull;
                    }
                    dst[*dst_pos] = decoded;
                    *dst_pos += 1;
                    *src_pos += 1;
                    self.state = DecoderState::InFrame;
                }
            }
        }
        DecodeStatus::NeedMoreData
    }
}

impl Default for SlipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Owned-buffer frame reader ─────────────────────────────────────────────────

/// A [`SlipDecoder`] bundled with its own bounded payload buffer.
///
/// [`push`](FrameReader::push) accepts whatever chunk the transport just
/// delivered and returns every frame it completed.  A frame longer than the
/// buffer is dropped with a warning and the decoder resynchronises on the next
/// `END`.
#[derive(Debug)]
pub struct FrameReader {
    decoder: SlipDecoder,
    buf: Vec<u8>,
    pos: usize,
}

impl FrameReader {
    /// Creates a reader whose frames may be at most `capacity` bytes long.
    pub fn new(capacity: usize, policy: InvalidEscapePolicy) -> Self {
        Self {
            decoder: SlipDecoder::with_policy(policy),
            buf: vec![0u8; capacity],
            pos: 0,
        }
    }

    /// Feeds a transport chunk and returns the completed frames, oldest first.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut src_pos = 0;
        while src_pos < bytes.len() {
            match self
                .decoder
                .decode(bytes, &mut src_pos, &mut self.buf, &mut self.pos)
            {
                DecodeStatus::FrameComplete => {
                    frames.push(self.buf[..self.pos].to_vec());
                    self.pos = 0;
                }
                DecodeStatus::NeedMoreData => break,
                DecodeStatus::DestinationFull => {
                    warn!(
                        capacity = self.buf.len(),
                        "dropping frame that exceeds the maximum packet length"
                    );
                    self.decoder.reset();
                    self.pos = 0;
                }
                DecodeStatus::InvalidEscape(byte) => {
                    warn!(byte, "dropping frame with invalid escape sequence");
                    self.pos = 0;
                }
            }
        }
        frames
    }

    /// Discards any partial frame and waits for the next frame start.
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.pos = 0;
    }

    /// State of the underlying decoder.
    pub fn state(&self) -> DecoderState {
        self.decoder.state()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
