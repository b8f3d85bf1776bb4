//! MSP commands and DisplayPort subcommands
//!
//! All DisplayPort traffic shares one MSP command ([`MSP_DISPLAYPORT`]); the
//! first payload byte selects the subcommand:
//! - Heartbeat, release, clear-screen: no arguments
//! - Write-string: `[row][col][attribute][string...]`
//! - Draw-screen: commit the current grid as a frame

use crate::frame::{Direction, Frame, FrameError, MAX_PAYLOAD_SIZE};
use heapless::Vec;

// MSP command IDs
pub const MSP_API_VERSION: u8 = 0x01;
pub const MSP_FC_VERSION: u8 = 0x03;
pub const MSP_DISPLAYPORT: u8 = 0xB6;

// DisplayPort subcommand IDs
pub const DP_HEARTBEAT: u8 = 0x00;
pub const DP_RELEASE: u8 = 0x01;
pub const DP_CLEAR_SCREEN: u8 = 0x02;
pub const DP_WRITE_STRING: u8 = 0x03;
pub const DP_DRAW_SCREEN: u8 = 0x04;

/// Shortest valid write-string payload: subcommand, row, col, attribute
pub const WRITE_STRING_MIN_LEN: usize = 4;

/// Reasons a frame is not a usable DisplayPort command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    /// Frame carries a different MSP command
    WrongCommand(u8),
    /// Frame has no subcommand byte
    Empty,
    /// Subcommand byte outside the known set
    UnknownSubcommand(u8),
    /// Write-string payload shorter than its fixed header
    Truncated,
}

/// DisplayPort subcommands sent by the flight controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPortCommand<'a> {
    /// Keepalive
    Heartbeat,
    /// Flight controller gives up the display
    Release,
    /// Blank the whole grid
    ClearScreen,
    /// Write characters starting at a cell
    WriteString {
        row: u8,
        col: u8,
        /// Attribute byte followed by the string bytes
        data: &'a [u8],
    },
    /// Grid is coherent and ready to show
    DrawScreen,
}

impl<'a> DisplayPortCommand<'a> {
    /// Parse a command from an `MSP_DISPLAYPORT` frame
    pub fn from_frame(frame: &'a Frame) -> Result<Self, MessageError> {
        if frame.command != MSP_DISPLAYPORT {
            return Err(MessageError::WrongCommand(frame.command));
        }
        Self::from_payload(&frame.payload)
    }

    /// Parse a command from a DisplayPort payload
    pub fn from_payload(payload: &'a [u8]) -> Result<Self, MessageError> {
        let (&sub, _) = payload.split_first().ok_or(MessageError::Empty)?;
        match sub {
            DP_HEARTBEAT => Ok(DisplayPortCommand::Heartbeat),
            DP_RELEASE => Ok(DisplayPortCommand::Release),
            DP_CLEAR_SCREEN => Ok(DisplayPortCommand::ClearScreen),
            DP_WRITE_STRING => {
                if payload.len() < WRITE_STRING_MIN_LEN {
                    return Err(MessageError::Truncated);
                }
                Ok(DisplayPortCommand::WriteString {
                    row: payload[1],
                    col: payload[2],
                    data: &payload[3..],
                })
            }
            DP_DRAW_SCREEN => Ok(DisplayPortCommand::DrawScreen),
            other => Err(MessageError::UnknownSubcommand(other)),
        }
    }

    /// Subcommand byte for this command
    pub fn subcommand(&self) -> u8 {
        match self {
            DisplayPortCommand::Heartbeat => DP_HEARTBEAT,
            DisplayPortCommand::Release => DP_RELEASE,
            DisplayPortCommand::ClearScreen => DP_CLEAR_SCREEN,
            DisplayPortCommand::WriteString { .. } => DP_WRITE_STRING,
            DisplayPortCommand::DrawScreen => DP_DRAW_SCREEN,
        }
    }

    /// Encode this command as a flight-controller response frame
    ///
    /// Used by simulators and tests; the decoder side never needs it.
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
        payload
            .push(self.subcommand())
            .map_err(|_| FrameError::PayloadTooLarge)?;

        if let DisplayPortCommand::WriteString { row, col, data } = self {
            payload
                .extend_from_slice(&[*row, *col])
                .map_err(|_| FrameError::PayloadTooLarge)?;
            payload
                .extend_from_slice(data)
                .map_err(|_| FrameError::PayloadTooLarge)?;
        }

        Frame::new(Direction::Response, MSP_DISPLAYPORT, &payload)
    }
}

/// Build a request frame to poll the flight controller
pub fn msp_request(command: u8, payload: &[u8]) -> Result<Frame, FrameError> {
    Frame::new(Direction::Request, command, payload)
}
