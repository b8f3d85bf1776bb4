//! Display backend trait
//!
//! Defines the interface for anything that shows a committed canvas.

use crate::canvas::Canvas;

/// Display backend trait
///
/// Implementations take a read-only view of the canvas and present it,
/// e.g. by rasterizing it to an image file.
pub trait DisplayBackend {
    /// Error type for presentation failures
    type Error;

    /// Present the canvas as it is now
    ///
    /// Must not assume it is called for every draw-screen; intermediate
    /// frames may be skipped.
    fn present(&mut self, canvas: &Canvas) -> Result<(), Self::Error>;
}
