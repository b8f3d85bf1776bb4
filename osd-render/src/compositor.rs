//! Draw-screen handling
//!
//! [`Compositor`] sits between the canvas and a [`DisplayBackend`]: every
//! draw-screen goes through the [`FrameGate`], and only frames the gate lets
//! through reach the backend. [`PngOutput`] is the backend that renders to
//! an image file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use osd_display::{Canvas, DisplayBackend};
use tracing::{debug, trace};

use crate::commit::commit_png;
use crate::error::RenderError;
use crate::gate::{FrameGate, GateDecision};
use crate::renderer::OsdRenderer;

/// Backend that rasterizes the canvas and atomically replaces a PNG file
pub struct PngOutput {
    renderer: OsdRenderer,
    path: PathBuf,
}

impl PngOutput {
    /// Create an output writing to `path`
    pub fn new(renderer: OsdRenderer, path: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            path: path.into(),
        }
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renderer used for each frame
    pub fn renderer(&self) -> &OsdRenderer {
        &self.renderer
    }
}

impl DisplayBackend for PngOutput {
    type Error = RenderError;

    fn present(&mut self, canvas: &Canvas) -> Result<(), Self::Error> {
        let image = self.renderer.render(canvas);
        commit_png(&image, &self.path)?;
        trace!(frame = canvas.frame_counter(), path = %self.path.display(), "frame committed");
        Ok(())
    }
}

/// Gate plus backend
pub struct Compositor<B> {
    backend: B,
    gate: FrameGate,
    rendered: u64,
    throttled: u64,
}

impl<B: DisplayBackend> Compositor<B> {
    /// Create a compositor presenting at most `fps` frames per second
    pub fn new(backend: B, fps: f64) -> Self {
        Self {
            backend,
            gate: FrameGate::new(fps),
            rendered: 0,
            throttled: 0,
        }
    }

    /// Handle a draw-screen commit at `now`
    ///
    /// On success the canvas is marked clean. On backend failure the canvas
    /// stays dirty and the gate timestamp is left alone, so the next
    /// draw-screen retries.
    pub fn on_draw(&mut self, canvas: &mut Canvas, now: Instant) -> Result<GateDecision, B::Error> {
        let decision = self.gate.request(canvas.is_dirty(), now);
        match decision {
            GateDecision::Render => {
                if let Err(e) = self.backend.present(canvas) {
                    self.gate.abandon();
                    return Err(e);
                }
                canvas.mark_clean();
                self.gate.complete(now);
                self.rendered += 1;
            }
            GateDecision::Throttled => {
                self.throttled += 1;
                debug!(frame = canvas.frame_counter(), "draw throttled");
            }
            GateDecision::Clean => {}
        }
        Ok(decision)
    }

    /// Frames presented so far
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    /// Draws dropped by the gate so far
    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    /// The frame-rate gate
    pub fn gate(&self) -> &FrameGate {
        &self.gate
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
