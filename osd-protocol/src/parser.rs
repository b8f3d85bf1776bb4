//! Streaming frame parser
//!
//! Serial links deliver frames split across reads and mixed with line
//! noise. [`FrameParser`] is fed bytes as they arrive and yields frames as
//! soon as their checksum byte has been seen.

use heapless::Vec;

use crate::frame::{checksum, Direction, Frame, MARKER_LEN, MAX_PAYLOAD_SIZE};

/// State machine for parsing incoming frames
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    /// Last bytes seen while hunting for a marker
    window: [u8; MARKER_LEN],
    /// Number of valid bytes in `window`
    window_len: usize,
    direction: Direction,
    expected_length: u8,
    command: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    /// Bytes dropped while hunting for a marker
    discarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Scanning for a `$M` marker
    AwaitingMarker,
    /// Got marker, waiting for LENGTH
    AwaitingLength,
    /// Got LENGTH, waiting for COMMAND
    AwaitingCommand,
    /// Reading payload bytes
    AwaitingPayload,
    /// Waiting for CHECKSUM
    AwaitingChecksum,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitingMarker,
            window: [0; MARKER_LEN],
            window_len: 0,
            direction: Direction::Response,
            expected_length: 0,
            command: 0,
            payload: Vec::new(),
            discarded: 0,
        }
    }

    /// Drop any partially received frame and go back to hunting for a marker
    pub fn reset(&mut self) {
        self.state = ParseState::AwaitingMarker;
        self.window_len = 0;
        self.expected_length = 0;
        self.command = 0;
        self.payload.clear();
    }

    /// True once a marker has been matched and the frame is not finished
    pub fn in_progress(&self) -> bool {
        self.state != ParseState::AwaitingMarker
    }

    /// Total bytes thrown away while resynchronizing
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Some(frame)` when the checksum byte of a frame arrives,
    /// whether or not the checksum matched.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ParseState::AwaitingMarker => {
                self.push_window(byte);
                if self.window_len == MARKER_LEN {
                    if let Some(direction) = Direction::from_marker(&self.window) {
                        self.direction = direction;
                        self.window_len = 0;
                        self.state = ParseState::AwaitingLength;
                    }
                }
                None
            }
            ParseState::AwaitingLength => {
                self.expected_length = byte;
                self.state = ParseState::AwaitingCommand;
                None
            }
            ParseState::AwaitingCommand => {
                self.command = byte;
                self.payload.clear();
                self.state = if self.expected_length == 0 {
                    ParseState::AwaitingChecksum
                } else {
                    ParseState::AwaitingPayload
                };
                None
            }
            ParseState::AwaitingPayload => {
                // Capacity matches the largest LENGTH byte, so this cannot fail
                let _ = self.payload.push(byte);
                if self.payload.len() == self.expected_length as usize {
                    self.state = ParseState::AwaitingChecksum;
                }
                None
            }
            ParseState::AwaitingChecksum => {
                let expected = checksum(self.expected_length, self.command, &self.payload);
                let frame = Frame {
                    direction: self.direction,
                    command: self.command,
                    payload: core::mem::take(&mut self.payload),
                    checksum_valid: expected == byte,
                };
                self.reset();
                Some(frame)
            }
        }
    }

    /// Feed bytes until a frame completes
    ///
    /// Returns the first complete frame found and how many bytes of `bytes`
    /// were consumed. Bytes after the frame are left for the next call.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> (Option<Frame>, usize) {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(frame) = self.feed(byte) {
                return (Some(frame), i + 1);
            }
        }
        (None, bytes.len())
    }

    /// Slide the marker window forward by one byte
    ///
    /// Only the last `MARKER_LEN` bytes are retained, so arbitrary amounts of
    /// noise never grow the parser's memory.
    fn push_window(&mut self, byte: u8) {
        if self.window_len == MARKER_LEN {
            self.window.copy_within(1.., 0);
            self.window[MARKER_LEN - 1] = byte;
            self.discarded += 1;
        } else {
            self.window[self.window_len] = byte;
            self.window_len += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decode;
    use proptest::prelude::*;
    use std::vec::Vec as StdVec;

    fn encoded(command: u8, payload: &[u8]) -> StdVec<u8> {
        Frame::new(Direction::Response, command, payload)
            .unwrap()
            .encode_to_vec()
            .to_vec()
    }

    fn collect(parser: &mut FrameParser, mut bytes: &[u8]) -> StdVec<Frame> {
        let mut frames = StdVec::new();
        while !bytes.is_empty() {
            let (frame, used) = parser.feed_bytes(bytes);
            frames.extend(frame);
            bytes = &bytes[used..];
        }
        frames
    }

    #[test]
    fn test_frame_roundtrip() {
        let data = encoded(0xB6, &[1, 2, 3, 4, 5]);

        let mut parser = FrameParser::new();
        let (frame, used) = parser.feed_bytes(&data);
        let frame = frame.unwrap();

        assert_eq!(used, data.len());
        assert_eq!(frame.command, 0xB6);
        assert_eq!(&frame.payload[..], &[1, 2, 3, 4, 5]);
        assert!(frame.checksum_valid);
        assert!(!parser.in_progress());
    }

    #[test]
    fn test_parser_resync_after_garbage() {
        let mut data = StdVec::from(*b"\x00\xFF$M\x12$$M");
        data.extend(encoded(0xB6, &[0x04]));

        let mut parser = FrameParser::new();
        let frames = collect(&mut parser, &data);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, 0xB6);
        assert!(frames[0].checksum_valid);
        assert_eq!(parser.discarded(), 8);
    }

    #[test]
    fn test_parser_reports_bad_checksum() {
        let mut data = encoded(0xB6, &[0x02]);
        let last_idx = data.len() - 1;
        data[last_idx] ^= 0xFF;

        let mut parser = FrameParser::new();
        let (frame, _) = parser.feed_bytes(&data);
        let frame = frame.unwrap();

        assert!(!frame.checksum_valid);
        assert_eq!(&frame.payload[..], &[0x02]);
    }

    #[test]
    fn test_parser_chunked_delivery() {
        let data = encoded(0xB6, b"\x03\x01\x01\x00HELLO");
        let mut parser = FrameParser::new();

        for chunk in data[..data.len() - 1].chunks(2) {
            let (frame, used) = parser.feed_bytes(chunk);
            assert!(frame.is_none());
            assert_eq!(used, chunk.len());
        }
        assert!(parser.in_progress());

        let (frame, _) = parser.feed_bytes(&data[data.len() - 1..]);
        assert_eq!(&frame.unwrap().payload[..], b"\x03\x01\x01\x00HELLO");
    }

    #[test]
    fn test_parser_leaves_next_frame_unconsumed() {
        let mut data = encoded(0x01, &[]);
        let first_len = data.len();
        data.extend(encoded(0x03, &[9]));

        let mut parser = FrameParser::new();
        let (frame, used) = parser.feed_bytes(&data);
        assert_eq!(frame.unwrap().command, 0x01);
        assert_eq!(used, first_len);

        let (frame, _) = parser.feed_bytes(&data[used..]);
        assert_eq!(frame.unwrap().command, 0x03);
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let data = encoded(0xB6, &[0x03, 0x00, 0x00, 0x00, b'X']);
        let mut parser = FrameParser::new();
        parser.feed_bytes(&data[..6]);
        assert!(parser.in_progress());

        parser.reset();
        assert!(!parser.in_progress());

        // Tail of the old frame is noise now, the next frame still parses
        let mut rest = data[6..].to_vec();
        rest.extend(encoded(0xB6, &[0x04]));
        let frames = collect(&mut parser, &rest);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], &[0x04]);
    }

    #[test]
    fn test_error_direction() {
        let data = Frame::empty(Direction::Error, 0xBC).encode_to_vec();
        let mut parser = FrameParser::new();
        let (frame, _) = parser.feed_bytes(&data);
        assert_eq!(frame.unwrap().direction, Direction::Error);
    }

    proptest! {
        #[test]
        fn prop_parser_agrees_with_decode(
            noise in proptest::collection::vec(any::<u8>().prop_filter("no marker start", |b| *b != b'$'), 0..128),
            command in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            chunk in 1usize..16,
        ) {
            let frame_bytes = encoded(command, &payload);
            let mut data = noise.clone();
            data.extend_from_slice(&frame_bytes);

            let mut parser = FrameParser::new();
            let mut frames = StdVec::new();
            for piece in data.chunks(chunk) {
                frames.extend(collect(&mut parser, piece));
            }

            let (expected, _) = decode(&frame_bytes).unwrap();
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(&frames[0], &expected);
        }
    }
}
