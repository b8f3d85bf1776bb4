//! MSP DisplayPort relay
//!
//! Host side of the OSD pipeline. Two modes share the same frame reader:
//!
//! ```text
//!  forward:  serial FC ──$M<──▶ poll ──$M>──▶ UDP
//!  render:   UDP ──▶ FrameReader ──▶ Canvas ──▶ Compositor ──▶ PNG
//! ```
//!
//! The binary in `main.rs` only parses the command line and calls into
//! [`tasks`].

pub mod config;
pub mod error;
pub mod logging;
pub mod reader;
pub mod stats;
pub mod tasks;
pub mod transport;

pub use config::{Cli, Command, ForwardConfig, RenderConfig};
pub use error::RelayError;
pub use reader::FrameReader;
pub use stats::LinkStats;
