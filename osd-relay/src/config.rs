//! Command line and configuration file
//!
//! Every option can come from a TOML file (`--config`) or a flag; flags
//! win. File layout:
//!
//! ```toml
//! [render]
//! port = 14560
//! cols = 60
//! rows = 22
//! charset = "fonts/betaflight.png"
//! index_mode = "wrapping"
//!
//! [forward]
//! device = "/dev/ttyAMA0"
//! udp_port = 14560
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use osd_display::{DEFAULT_COLUMNS, DEFAULT_ROWS};
use osd_render::gate::DEFAULT_FPS;
use osd_render::{IndexMode, TileSize, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use serde::Deserialize;
use thiserror::Error;

/// Default UDP port DisplayPort frames are relayed on
pub const DEFAULT_PORT: u16 = 14560;

/// Default address for both binding and forwarding
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for our schema.
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Parser)]
#[command(name = "osd-relay", version, about = "MSP DisplayPort OSD relay and renderer")]
pub struct Cli {
    /// Log filter when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Receive DisplayPort frames over UDP and render them to a PNG overlay
    Render(RenderArgs),
    /// Poll a flight controller on a serial device and forward replies over UDP
    Forward(ForwardArgs),
}

#[derive(Debug, Default, Args)]
pub struct RenderArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to bind the UDP socket to
    #[arg(long)]
    pub bind: Option<String>,
    /// UDP port to listen on
    #[arg(long)]
    pub port: Option<u16>,
    /// Grid columns
    #[arg(long)]
    pub cols: Option<usize>,
    /// Grid rows
    #[arg(long)]
    pub rows: Option<usize>,
    /// Output image width in pixels
    #[arg(long)]
    pub width: Option<u32>,
    /// Output image height in pixels
    #[arg(long)]
    pub height: Option<u32>,
    /// Maximum renders per second
    #[arg(long)]
    pub fps: Option<f64>,
    /// Output PNG path
    #[arg(long, visible_alias = "output")]
    pub out: Option<PathBuf>,
    /// Glyph charset image; text fallback when absent
    #[arg(long)]
    pub charset: Option<PathBuf>,
    /// How byte codes map to charset tiles
    #[arg(long)]
    pub index_mode: Option<IndexMode>,
    /// Tile width for charsets that are not 16x16 or 256x1 tiles
    #[arg(long, requires = "tile_height")]
    pub tile_width: Option<u32>,
    /// Tile height for charsets that are not 16x16 or 256x1 tiles
    #[arg(long, requires = "tile_width")]
    pub tile_height: Option<u32>,
}

#[derive(Debug, Default, Args)]
pub struct ForwardArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Serial device node
    #[arg(long)]
    pub device: Option<PathBuf>,
    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<u32>,
    /// Host to forward replies to
    #[arg(long)]
    pub udp_host: Option<String>,
    /// UDP port to forward replies to
    #[arg(long)]
    pub udp_port: Option<u16>,
}

/// Settings for the UDP → PNG renderer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub bind: String,
    pub port: u16,
    pub cols: usize,
    pub rows: usize,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub out: PathBuf,
    pub charset: Option<PathBuf>,
    pub index_mode: IndexMode,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    /// Socket read timeout; expiry just means no data yet
    pub read_timeout_ms: u64,
    /// Interval between statistics log lines
    pub stats_interval_s: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cols: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            out: PathBuf::from("osd.png"),
            charset: None,
            index_mode: IndexMode::Strict,
            tile_width: None,
            tile_height: None,
            read_timeout_ms: 200,
            stats_interval_s: 5,
        }
    }
}

impl RenderConfig {
    /// Explicit tile size, if both dimensions are set
    pub fn tile_size(&self) -> Option<TileSize> {
        match (self.tile_width, self.tile_height) {
            (Some(width), Some(height)) => Some(TileSize { width, height }),
            _ => None,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_s)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.cols, self.rows
            )));
        }
        if self.cols > usize::from(u8::MAX) + 1 || self.rows > usize::from(u8::MAX) + 1 {
            return Err(ConfigError::Invalid(format!(
                "grid {}x{} exceeds the 256x256 DisplayPort address space",
                self.cols, self.rows
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "image must be at least 1x1 pixels, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps.is_nan() || self.fps <= 0.0 {
            return Err(ConfigError::Invalid(format!("fps must be positive, got {}", self.fps)));
        }
        if self.tile_width.is_some() != self.tile_height.is_some() {
            return Err(ConfigError::Invalid(
                "tile_width and tile_height must be given together".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings for the serial → UDP forwarder
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwardConfig {
    pub device: PathBuf,
    /// Opened 8N1 raw at this rate
    pub baud: u32,
    pub udp_host: String,
    pub udp_port: u16,
    /// Single serial read timeout
    pub read_timeout_ms: u64,
    /// How long to wait for the reply to a probe request
    pub reply_timeout_ms: u64,
    /// How long to collect replies after each poll request
    pub poll_window_ms: u64,
    /// Pause between poll cycles
    pub poll_interval_ms: u64,
    /// Give up on a half-received frame after this long
    pub frame_timeout_ms: u64,
    /// Interval between statistics log lines
    pub stats_interval_s: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyAMA0"),
            baud: 115_200,
            udp_host: DEFAULT_HOST.to_string(),
            udp_port: DEFAULT_PORT,
            read_timeout_ms: 20,
            reply_timeout_ms: 700,
            poll_window_ms: 50,
            poll_interval_ms: 20,
            frame_timeout_ms: 500,
            stats_interval_s: 5,
        }
    }
}

impl ForwardConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud == 0 {
            return Err(ConfigError::Invalid("baud must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be positive".to_string()));
        }
        if self.frame_timeout_ms == 0 {
            return Err(ConfigError::Invalid("frame_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Layout of the TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    render: RenderConfig,
    forward: ForwardConfig,
}

fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl RenderArgs {
    /// Merge file values, flags and defaults, then validate
    pub fn resolve(self) -> Result<RenderConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_file(path)?.render,
            None => RenderConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(cols) = self.cols {
            config.cols = cols;
        }
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(out) = self.out {
            config.out = out;
        }
        if self.charset.is_some() {
            config.charset = self.charset;
        }
        if let Some(mode) = self.index_mode {
            config.index_mode = mode;
        }
        if self.tile_width.is_some() {
            config.tile_width = self.tile_width;
            config.tile_height = self.tile_height;
        }

        config.validate()?;
        Ok(config)
    }
}

impl ForwardArgs {
    /// Merge file values, flags and defaults, then validate
    pub fn resolve(self) -> Result<ForwardConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_file(path)?.forward,
            None => ForwardConfig::default(),
        };

        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(host) = self.udp_host {
            config.udp_host = host;
        }
        if let Some(port) = self.udp_port {
            config.udp_port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_defaults() {
        let config = RenderArgs::default().resolve().unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!((config.cols, config.rows), (60, 22));
        assert_eq!((config.width, config.height), (720, 576));
        assert_eq!(config.fps, 20.0);
        assert_eq!(config.port, 14560);
        assert_eq!(config.out, PathBuf::from("osd.png"));
        assert_eq!(config.charset, None);
    }

    #[test]
    fn test_output_alias() {
        let cli = Cli::try_parse_from(["osd-relay", "render", "--output", "frames/osd.png"]).unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.resolve().unwrap().out, PathBuf::from("frames/osd.png"));
    }

    #[test]
    fn test_index_mode_flag() {
        let cli = Cli::try_parse_from(["osd-relay", "render", "--index-mode", "wrapping"]).unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.resolve().unwrap().index_mode, IndexMode::Wrapping);
    }

    #[test]
    fn test_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osd.toml");
        fs::write(
            &path,
            "[render]\ncols = 30\nrows = 16\nfps = 10.0\nindex_mode = \"wrapping\"\n\n[forward]\nudp_port = 9000\n",
        )
        .unwrap();

        let render = RenderArgs {
            config: Some(path.clone()),
            rows: Some(13),
            ..RenderArgs::default()
        }
        .resolve()
        .unwrap();
        assert_eq!((render.cols, render.rows), (30, 13));
        assert_eq!(render.fps, 10.0);
        assert_eq!(render.index_mode, IndexMode::Wrapping);
        assert_eq!(render.width, 720);

        let forward = ForwardArgs {
            config: Some(path),
            ..ForwardArgs::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(forward.udp_port, 9000);
        assert_eq!(forward.device, PathBuf::from("/dev/ttyAMA0"));
        assert_eq!(forward.baud, 115_200);
    }

    #[test]
    fn test_baud_flag() {
        let cli = Cli::try_parse_from([
            "osd-relay",
            "forward",
            "--device",
            "/dev/ttyUSB0",
            "--baud",
            "57600",
        ])
        .unwrap();
        let Command::Forward(args) = cli.command else {
            panic!("expected forward");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.baud, 57_600);
        assert_eq!(config.device, PathBuf::from("/dev/ttyUSB0"));

        let zero = ForwardConfig {
            baud: 0,
            ..ForwardConfig::default()
        };
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osd.toml");
        fs::write(&path, "[render]\ncolumns = 30\n").unwrap();

        let result = RenderArgs {
            config: Some(path),
            ..RenderArgs::default()
        }
        .resolve();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation() {
        let bad = [
            RenderConfig {
                cols: 0,
                ..RenderConfig::default()
            },
            RenderConfig {
                width: 0,
                ..RenderConfig::default()
            },
            RenderConfig {
                fps: 0.0,
                ..RenderConfig::default()
            },
            RenderConfig {
                fps: f64::NAN,
                ..RenderConfig::default()
            },
            RenderConfig {
                tile_width: Some(12),
                ..RenderConfig::default()
            },
            RenderConfig {
                rows: 300,
                ..RenderConfig::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_tile_size() {
        let config = RenderConfig {
            tile_width: Some(12),
            tile_height: Some(18),
            ..RenderConfig::default()
        };
        assert_eq!(
            config.tile_size(),
            Some(TileSize {
                width: 12,
                height: 18
            })
        );
        assert_eq!(RenderConfig::default().tile_size(), None);
    }
}
