//! OSD rendering
//!
//! Turns a committed [`osd_display::Canvas`] into an RGBA overlay image:
//!
//! - [`atlas`] - glyph tile atlas loading and index resolution
//! - [`glyph`] - per-cell choice between tile, text and nothing
//! - [`raster`] - drawing surface over an `image::RgbaImage`
//! - [`renderer`] - canvas to image
//! - [`gate`] - frame-rate limiting of draw commits
//! - [`commit`] - atomic PNG replacement on disk
//! - [`compositor`] - gate + backend glue driven by draw-screen commands

#![deny(unsafe_code)]

pub mod atlas;
pub mod commit;
pub mod compositor;
pub mod error;
pub mod gate;
pub mod glyph;
pub mod raster;
pub mod renderer;

pub use atlas::{IndexMode, TileAtlas, TileSize};
pub use commit::{commit_png, probe_output};
pub use compositor::{Compositor, PngOutput};
pub use error::RenderError;
pub use gate::{FrameGate, GateDecision};
pub use glyph::{resolve_glyph, Glyph};
pub use renderer::{CellMetrics, OsdRenderer, DEFAULT_HEIGHT, DEFAULT_WIDTH};
