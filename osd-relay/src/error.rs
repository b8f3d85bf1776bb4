//! Relay error type

use std::io;
use std::path::PathBuf;

use osd_protocol::FrameError;
use osd_render::RenderError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop a relay mode
///
/// Protocol noise never ends up here; only setup failures and broken
/// links do.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// UDP socket could not be bound or connected.
    #[error("failed to open UDP socket {addr}: {source}")]
    Socket {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Serial device could not be opened.
    #[error("failed to open serial device {}: {source}", path.display())]
    Device {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Request frame could not be built.
    #[error("failed to encode request 0x{command:02X}: {error:?}")]
    Encode { command: u8, error: FrameError },

    /// Link failed while running.
    #[error("link error: {0}")]
    Io(#[from] io::Error),
}
