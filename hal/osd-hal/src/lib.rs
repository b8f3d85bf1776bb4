//! OSD link abstraction layer
//!
//! This crate defines the transport traits the decoder loops are written
//! against. A serial port, a UDP socket or an in-memory test double all
//! look the same from above.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Loops (osd-relay render / forward)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  osd-hal (this crate - traits)          │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  UDP socket   │       │ serial device │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`link::LinkRx`] - bounded-time reads
//! - [`link::LinkTx`] - writes and flushes

#![no_std]
#![deny(unsafe_code)]

pub mod link;

// Re-export key traits at crate root for convenience
pub use link::{Link, LinkRx, LinkTx};
