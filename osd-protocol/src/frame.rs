//! Frame encoding and decoding for MSPv1.
//!
//! Frame format:
//! - MARKER (3 bytes): `$M<`, `$M>` or `$M!`
//! - LENGTH (1 byte): payload length (0-255)
//! - COMMAND (1 byte): MSP command identifier
//! - PAYLOAD (0-255 bytes): command-specific data
//! - CHECKSUM (1 byte): XOR of LENGTH, COMMAND, and all PAYLOAD bytes

use heapless::Vec;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Bytes of framing around the payload (MARKER + LENGTH + COMMAND + CHECKSUM)
pub const FRAME_OVERHEAD: usize = 3 + 1 + 1 + 1;

/// Smallest possible frame (empty payload)
pub const MIN_FRAME_SIZE: usize = FRAME_OVERHEAD;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

/// Length of the direction marker
pub const MARKER_LEN: usize = 3;

/// Errors that can occur while building or encoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Reasons [`decode`] could not produce a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes yet; retry once more data arrives
    Incomplete,
    /// Buffer does not start with a recognized marker
    NotAFrame,
}

/// Frame direction, encoded by the third marker byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `$M<` - sent to the flight controller
    Request,
    /// `$M>` - reply from the flight controller
    Response,
    /// `$M!` - flight controller rejected the request
    Error,
}

impl Direction {
    /// All directions, in marker-byte order
    pub const ALL: [Direction; 3] = [Direction::Request, Direction::Response, Direction::Error];

    /// Wire marker for this direction
    pub const fn marker(self) -> [u8; MARKER_LEN] {
        match self {
            Direction::Request => *b"$M<",
            Direction::Response => *b"$M>",
            Direction::Error => *b"$M!",
        }
    }

    /// Match a 3-byte marker
    pub fn from_marker(marker: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.marker() == marker)
    }
}

/// A parsed or constructed frame
///
/// Frames with a bad checksum are still returned by the decoders with
/// `checksum_valid == false`; it is up to the caller to discard them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Marker the frame arrived with
    pub direction: Direction,
    /// MSP command identifier
    pub command: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    /// Whether the trailing checksum byte matched
    pub checksum_valid: bool,
}

/// Calculate the MSPv1 checksum over a frame's length, command and payload
pub fn checksum(length: u8, command: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(length ^ command, |acc, &byte| acc ^ byte)
}

impl Frame {
    /// Create a new frame with the given direction, command and payload
    pub fn new(direction: Direction, command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            direction,
            command,
            payload: payload_vec,
            checksum_valid: true,
        })
    }

    /// Create a frame with no payload
    pub fn empty(direction: Direction, command: u8) -> Self {
        Self {
            direction,
            command,
            payload: Vec::new(),
            checksum_valid: true,
        }
    }

    /// Size of this frame on the wire
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode this frame into a byte buffer
    ///
    /// The checksum is always recomputed, so encoding a frame that was
    /// decoded with a bad checksum produces a valid one.
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.wire_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let length = self.payload.len() as u8;
        let end = 5 + self.payload.len();

        buffer[..MARKER_LEN].copy_from_slice(&self.direction.marker());
        buffer[3] = length;
        buffer[4] = self.command;
        buffer[5..end].copy_from_slice(&self.payload);
        buffer[end] = checksum(length, self.command, &self.payload);

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        // MAX_FRAME_SIZE always fits a payload bounded by MAX_PAYLOAD_SIZE
        let len = self.encode(&mut buffer).unwrap_or(0);
        let mut vec = Vec::new();
        let _ = vec.extend_from_slice(&buffer[..len]);
        vec
    }
}

/// Decode exactly one frame starting at offset 0 of `buf`
///
/// Returns the frame and the number of bytes it occupies. The input is
/// never consumed; advancing and resynchronizing is up to the caller.
pub fn decode(buf: &[u8]) -> Result<(Frame, usize), DecodeError> {
    if buf.len() < MIN_FRAME_SIZE {
        return Err(DecodeError::Incomplete);
    }

    let direction = Direction::from_marker(&buf[..MARKER_LEN]).ok_or(DecodeError::NotAFrame)?;

    let length = buf[3];
    let command = buf[4];
    let need = FRAME_OVERHEAD + length as usize;
    if buf.len() < need {
        return Err(DecodeError::Incomplete);
    }

    let body = &buf[5..5 + length as usize];
    let received = buf[need - 1];

    let mut payload = Vec::new();
    // length is a u8, so it always fits MAX_PAYLOAD_SIZE
    let _ = payload.extend_from_slice(body);

    let frame = Frame {
        direction,
        command,
        payload,
        checksum_valid: checksum(length, command, body) == received,
    };

    Ok((frame, need))
}
