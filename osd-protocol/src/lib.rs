//! MSP DisplayPort protocol
//!
//! This crate decodes the MSPv1 frames a flight controller emits on its
//! MSP link, and the DisplayPort subcommands carried inside them that
//! drive a remote on-screen display.
//!
//! # Frame Format
//!
//! ```text
//! ┌────────┬────────┬─────────┬─────────────┬──────────┐
//! │ MARKER │ LENGTH │ COMMAND │ PAYLOAD     │ CHECKSUM │
//! │ 3B     │ 1B     │ 1B      │ 0–255B      │ 1B       │
//! └────────┴────────┴─────────┴─────────────┴──────────┘
//! ```
//!
//! The marker is `$M<` (request), `$M>` (response) or `$M!` (error). The
//! checksum is the XOR of LENGTH, COMMAND and every PAYLOAD byte.
//!
//! Two decoders are provided: [`decode`] for a buffer that should start with
//! a frame (one UDP datagram), and [`FrameParser`] for byte streams that may
//! carry noise and split frames across reads.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod frame;
pub mod messages;
pub mod parser;

pub use frame::{
    checksum, decode, DecodeError, Direction, Frame, FrameError, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
    MIN_FRAME_SIZE,
};
pub use messages::{msp_request, DisplayPortCommand, MessageError, MSP_DISPLAYPORT};
pub use parser::FrameParser;
