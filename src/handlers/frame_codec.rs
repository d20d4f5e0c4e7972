use serde::Serialize;
use serde_with::hex::Hex;
use serde_with::serde_as;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::protocol::{Destination, POSTAMBLE, PREAMBLE};
use crate::utils::format_hex;

use super::crc::crc16;

/// Preamble, sequence, destination (2) and length (2).
pub(crate) const HEADER_LEN: usize = 6;
/// CRC (2) and postamble.
pub(crate) const TRAILER_LEN: usize = 3;
const CRC_LEN: usize = 2;
const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Errors returned by frame encoding and frame construction.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameCodecError {
    /// The payload does not fit the 16-bit length field.
    #[error("frame payload is too large: {payload_len} bytes exceeds max {max_payload_len}")]
    PayloadTooLarge {
        payload_len: usize,
        max_payload_len: usize,
    },
    /// The byte slice cannot hold a header and trailer.
    #[error("frame is too short: expected at least 9 bytes, got {actual}")]
    FrameTooShort { actual: usize },
    /// The first byte is not the `0x0F` preamble.
    #[error("frame starts with 0x{found:02X} instead of the 0x0F preamble")]
    MissingPreamble { found: u8 },
    /// The last byte is not the `0xF0` postamble.
    #[error("frame ends with 0x{found:02X} instead of the 0xF0 postamble")]
    MissingPostamble { found: u8 },
}

/// One complete preamble-to-postamble wire unit.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Frame {
    #[serde_as(as = "Hex")]
    raw: Vec<u8>,
}

impl Frame {
    /// Wraps raw frame bytes after checking the sentinels and minimum length.
    ///
    /// The CRC is not checked here; see [`Frame::crc_valid`].
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are too short or the sentinel bytes are wrong.
    ///
    /// ```
    /// use tapin::Frame;
    ///
    /// let frame = Frame::from_bytes(vec![0x0F, 0x03, 0x01, 0x00, 0x02, 0x00, 0xF8, 0x01, 0xC1, 0x23, 0xF0])?;
    /// assert_eq!(&[0xF8, 0x01], frame.payload());
    /// assert!(frame.crc_valid());
    /// # Ok::<(), tapin::FrameCodecError>(())
    /// ```
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, FrameCodecError> {
        if raw.len() < HEADER_LEN + TRAILER_LEN {
            return Err(FrameCodecError::FrameTooShort { actual: raw.len() });
        }
        if raw[0] != PREAMBLE {
            return Err(FrameCodecError::MissingPreamble { found: raw[0] });
        }
        let last = raw[raw.len() - 1];
        if last != POSTAMBLE {
            return Err(FrameCodecError::MissingPostamble { found: last });
        }

        Ok(Self { raw })
    }

    /// Returns the package sequence index.
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.raw[1]
    }

    /// Returns the raw 16-bit destination id.
    #[must_use]
    pub fn destination_id(&self) -> u16 {
        u16::from_le_bytes([self.raw[2], self.raw[3]])
    }

    /// Returns the typed destination.
    #[must_use]
    pub fn destination(&self) -> Destination {
        Destination::from(self.destination_id())
    }

    /// Returns the payload length declared in the header.
    #[must_use]
    pub fn declared_len(&self) -> u16 {
        u16::from_le_bytes([self.raw[4], self.raw[5]])
    }

    /// Returns the payload bytes between the header and the CRC.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.raw[HEADER_LEN..self.crc_offset()]
    }

    /// Returns the CRC embedded in the frame.
    #[must_use]
    pub fn crc(&self) -> [u8; 2] {
        let offset = self.crc_offset();
        [self.raw[offset], self.raw[offset + 1]]
    }

    /// Returns the CRC recomputed over header and payload.
    #[must_use]
    pub fn expected_crc(&self) -> [u8; 2] {
        crc16(&self.raw[..self.crc_offset()])
    }

    /// Returns whether the embedded CRC matches the recomputed one.
    #[must_use]
    pub fn crc_valid(&self) -> bool {
        self.crc() == self.expected_crc()
    }

    /// Returns the complete frame bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consumes the frame and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    fn crc_offset(&self) -> usize {
        self.raw.len() - TRAILER_LEN
    }
}

/// Outgoing package index: starts at 1 and wraps from 255 back to 1.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SequenceCounter(u8);

impl SequenceCounter {
    /// Creates a counter whose first index is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self(1)
    }

    /// Returns the index the next frame will use.
    #[must_use]
    pub const fn peek(self) -> u8 {
        self.0
    }

    /// Returns the current index and advances, skipping 0.
    ///
    /// ```
    /// use tapin::SequenceCounter;
    ///
    /// let mut counter = SequenceCounter::new();
    /// assert_eq!(1, counter.advance());
    /// assert_eq!(2, counter.advance());
    /// ```
    pub fn advance(&mut self) -> u8 {
        let current = self.0;
        self.0 = if current == u8::MAX { 1 } else { current + 1 };
        current
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes TAP-in frames.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes one frame around `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error when `payload` does not fit the 16-bit length field.
    ///
    /// ```
    /// use tapin::{Destination, FrameCodec};
    ///
    /// let frame = FrameCodec::encode(4, Destination::Console, &[0xF8, 0x00])?;
    /// assert_eq!(
    ///     vec![0x0F, 0x04, 0x01, 0x00, 0x02, 0x00, 0xF8, 0x00, 0xA4, 0x2A, 0xF0],
    ///     frame
    /// );
    /// # Ok::<(), tapin::FrameCodecError>(())
    /// ```
    pub fn encode(
        sequence: u8,
        destination: Destination,
        payload: &[u8],
    ) -> Result<Vec<u8>, FrameCodecError> {
        let payload_len = u16::try_from(payload.len()).map_err(|_overflow| {
            FrameCodecError::PayloadTooLarge {
                payload_len: payload.len(),
                max_payload_len: MAX_PAYLOAD_LEN,
            }
        })?;

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
        frame.push(PREAMBLE);
        frame.push(sequence);
        frame.extend_from_slice(&destination.id().to_le_bytes());
        frame.extend_from_slice(&payload_len.to_le_bytes());
        frame.extend_from_slice(payload);
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc);
        frame.push(POSTAMBLE);
        Ok(frame)
    }
}

/// Outcome of inspecting the bytes that follow one preamble candidate.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Candidate {
    /// A CRC-valid frame of this many bytes.
    Complete(usize),
    /// Not enough bytes buffered to decide.
    Incomplete,
    /// Enough bytes buffered, but the candidate is not a valid frame.
    Corrupt,
}

/// Streaming frame extractor over an append-only receive buffer.
///
/// Chunks may split frames anywhere. A candidate that fails its postamble or
/// CRC check only costs its leading preamble byte; the length field of a
/// rejected candidate is never used to skip data.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates a decoder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes waiting for more data.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Appends `chunk` and returns every frame that is now complete, in order.
    #[instrument(skip(self, chunk), level = "trace", fields(chunk_len = chunk.len()))]
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let mut waiting_at = None;
        let mut search_from = 0;

        while let Some(offset) = find_preamble(&self.buffer[search_from..]) {
            let start = search_from + offset;
            match inspect_candidate(&self.buffer[start..]) {
                Candidate::Complete(frame_len) => {
                    self.discard_front(start);
                    let raw: Vec<u8> = self.buffer.drain(..frame_len).collect();
                    return Some(Frame { raw });
                }
                Candidate::Incomplete => {
                    waiting_at.get_or_insert(start);
                }
                Candidate::Corrupt => {
                    warn!(offset = start, "dropping corrupt frame candidate and resynchronising");
                }
            }
            search_from = start + 1;
        }

        match waiting_at {
            Some(start) => self.discard_front(start),
            None => {
                let len = self.buffer.len();
                self.discard_front(len);
            }
        }
        None
    }

    fn discard_front(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        debug!(
            discarded = count,
            bytes = %format_hex(&self.buffer[..count]),
            "discarding bytes outside any frame"
        );
        self.buffer.drain(..count);
    }
}

fn find_preamble(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&byte| byte == PREAMBLE)
}

fn inspect_candidate(bytes: &[u8]) -> Candidate {
    if bytes.len() < HEADER_LEN {
        return Candidate::Incomplete;
    }

    let payload_len = usize::from(u16::from_le_bytes([bytes[4], bytes[5]]));
    let frame_len = HEADER_LEN + payload_len + TRAILER_LEN;
    let Some(candidate) = bytes.get(..frame_len) else {
        return Candidate::Incomplete;
    };

    if candidate[frame_len - 1] != POSTAMBLE {
        return Candidate::Corrupt;
    }

    let crc_offset = frame_len - TRAILER_LEN;
    let expected = crc16(&candidate[..crc_offset]);
    if candidate[crc_offset..crc_offset + CRC_LEN] != expected {
        warn!(
            expected = %format_hex(&expected),
            actual = %format_hex(&candidate[crc_offset..crc_offset + CRC_LEN]),
            "frame CRC mismatch"
        );
        return Candidate::Corrupt;
    }

    Candidate::Complete(frame_len)
}
