//! Error types for osd-render.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading assets or writing rendered frames
///
/// All of these point at unusable configuration (bad charset, unwritable
/// output) rather than protocol noise.
#[derive(Debug, Error)]
pub enum RenderError {
    /// IO error from filesystem operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Image decoding or encoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Charset dimensions match neither supported layout.
    #[error("unsupported charset layout {width}x{height}: expected 16x16 or 256x1 tiles")]
    UnsupportedLayout { width: u32, height: u32 },

    /// Explicit tile size does not fit inside the charset.
    #[error("tile size {tile_width}x{tile_height} does not fit a {width}x{height} charset")]
    TileSizeMismatch {
        tile_width: u32,
        tile_height: u32,
        width: u32,
        height: u32,
    },

    /// Temporary file could not be renamed over the output.
    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    /// Output directory rejected a probe write.
    #[error("output directory {} is not writable: {source}", path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
