//! UDP → PNG render task
//!
//! Receives DisplayPort frames, applies them to the canvas, and hands every
//! draw-screen to the compositor. Noise, bad checksums and unknown commands
//! are counted and dropped; the loop keeps going.

use std::fmt::Display;
use std::time::Instant;

use osd_display::{Canvas, DisplayBackend};
use osd_hal::LinkRx;
use osd_protocol::{DisplayPortCommand, Frame, MessageError};
use osd_render::{probe_output, Compositor, GateDecision, OsdRenderer, PngOutput, TileAtlas};
use tracing::{debug, info, trace, warn};

use crate::config::RenderConfig;
use crate::error::RelayError;
use crate::reader::FrameReader;
use crate::stats::{LinkStats, StatsTicker};
use crate::transport::UdpLink;

/// Canvas, compositor and counters for one render session
pub struct RenderSession<B> {
    canvas: Canvas,
    compositor: Compositor<B>,
    stats: LinkStats,
}

impl<B> RenderSession<B>
where
    B: DisplayBackend,
    B::Error: Display,
{
    /// Start with a blank `columns` x `rows` canvas
    pub fn new(columns: usize, rows: usize, backend: B, fps: f64) -> Self {
        Self {
            canvas: Canvas::new(columns, rows),
            compositor: Compositor::new(backend, fps),
            stats: LinkStats::default(),
        }
    }

    /// Handle one frame received at `now`
    pub fn handle_frame(&mut self, frame: &Frame, now: Instant) {
        if !frame.checksum_valid {
            self.stats.bad_checksum += 1;
            debug!(command = frame.command, "bad checksum, frame dropped");
            return;
        }
        self.stats.frames += 1;

        let command = match DisplayPortCommand::from_frame(frame) {
            Ok(command) => command,
            Err(MessageError::WrongCommand(command)) => {
                self.stats.ignored += 1;
                trace!(command, "not a DisplayPort frame");
                return;
            }
            Err(e) => {
                self.stats.malformed += 1;
                debug!(error = ?e, "malformed DisplayPort frame");
                return;
            }
        };

        self.stats.record_command(&command);
        self.canvas.apply(&command);

        if let DisplayPortCommand::DrawScreen = command {
            self.on_draw(now);
        }
    }

    fn on_draw(&mut self, now: Instant) {
        match self.compositor.on_draw(&mut self.canvas, now) {
            Ok(GateDecision::Render) => {
                self.stats.rendered += 1;
                trace!(frame = self.canvas.frame_counter(), "frame rendered");
                for row in 0..self.canvas.rows() {
                    if let Some(text) = self.canvas.row_text(row) {
                        trace!("{row:02} |{text}|");
                    }
                }
            }
            Ok(GateDecision::Throttled) => self.stats.throttled += 1,
            Ok(GateDecision::Clean) => {}
            Err(e) => {
                self.stats.render_errors += 1;
                warn!(frame = self.canvas.frame_counter(), error = %e, "render failed");
            }
        }
    }

    /// Current grid
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// The compositor
    pub fn compositor(&self) -> &Compositor<B> {
        &self.compositor
    }

    /// Counters so far
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Copy link-level counters from the reader
    fn sync_link<R: LinkRx>(&mut self, reader: &FrameReader<R>) {
        self.stats.chunks = reader.chunks();
        self.stats.noise_bytes = reader.noise_bytes();
    }
}

/// Receive frames until `max_frames` have been handled
///
/// With no limit this only returns on a link error.
pub fn serve<R, B>(
    reader: &mut FrameReader<R>,
    session: &mut RenderSession<B>,
    ticker: &mut StatsTicker,
    max_frames: Option<u64>,
) -> Result<(), R::Error>
where
    R: LinkRx,
    B: DisplayBackend,
    B::Error: Display,
{
    let mut handled = 0u64;

    while max_frames.map_or(true, |max| handled < max) {
        let frame = reader.poll()?;
        let now = Instant::now();

        if let Some(frame) = frame {
            session.handle_frame(&frame, now);
            handled += 1;
        }

        if ticker.due(now) {
            session.sync_link(reader);
            session.stats().log("render");
        }
    }

    session.sync_link(reader);
    Ok(())
}

/// Run the render mode
///
/// Output path, charset and socket are checked before anything is
/// received; failures there end the run.
pub fn run(config: &RenderConfig, max_frames: Option<u64>) -> Result<LinkStats, RelayError> {
    probe_output(&config.out)?;

    let atlas = config
        .charset
        .as_deref()
        .map(|path| TileAtlas::open(path, config.index_mode, config.tile_size()))
        .transpose()?;
    if atlas.is_none() {
        info!("no charset configured, using text fallback");
    }

    let renderer = OsdRenderer::new(config.width, config.height, config.cols, config.rows, atlas);
    let output = PngOutput::new(renderer, &config.out);
    let mut session = RenderSession::new(config.cols, config.rows, output, config.fps);

    let link = UdpLink::bind(&config.bind, config.port).map_err(|source| RelayError::Socket {
        addr: format!("{}:{}", config.bind, config.port),
        source,
    })?;
    let local = link.local_addr()?;
    let mut reader =
        FrameReader::new(link, config.read_timeout(), config.read_timeout()).datagrams();

    info!(
        listen = %local,
        out = %config.out.display(),
        cols = config.cols,
        rows = config.rows,
        width = config.width,
        height = config.height,
        fps = config.fps,
        "rendering DisplayPort frames"
    );

    let mut ticker = StatsTicker::new(config.stats_interval(), Instant::now());
    serve(&mut reader, &mut session, &mut ticker, max_frames)?;

    session.stats().log("render finished");
    Ok(session.stats().clone())
}
