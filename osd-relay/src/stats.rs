//! Link statistics
//!
//! Counters for everything that crosses the link, summarized in one log
//! line every few seconds and once more at exit.

use std::time::{Duration, Instant};

use osd_protocol::DisplayPortCommand;
use tracing::info;

/// Subcommand names, indexed by subcommand byte
const SUBCOMMAND_NAMES: [&str; 5] = ["heartbeat", "release", "clear", "write", "draw"];

/// Counters for one relay session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkStats {
    /// Non-empty reads (datagrams or serial chunks)
    pub chunks: u64,
    /// Frames with a valid checksum
    pub frames: u64,
    /// Frames whose checksum did not match
    pub bad_checksum: u64,
    /// Valid frames for other MSP commands
    pub ignored: u64,
    /// DisplayPort frames with an unknown subcommand or short payload
    pub malformed: u64,
    /// DisplayPort frames per subcommand
    pub subcommands: [u64; 5],
    /// Frames presented
    pub rendered: u64,
    /// Draws dropped by the frame-rate gate
    pub throttled: u64,
    /// Renders that failed
    pub render_errors: u64,
    /// Frames forwarded to UDP
    pub forwarded: u64,
    /// Bytes skipped while looking for a marker
    pub noise_bytes: u64,
}

impl LinkStats {
    /// Count one decoded DisplayPort command
    pub fn record_command(&mut self, command: &DisplayPortCommand<'_>) {
        if let Some(count) = self.subcommands.get_mut(usize::from(command.subcommand())) {
            *count += 1;
        }
    }

    /// Count for one subcommand byte
    pub fn subcommand(&self, subcommand: u8) -> u64 {
        self.subcommands
            .get(usize::from(subcommand))
            .copied()
            .unwrap_or(0)
    }

    /// Emit the summary line
    pub fn log(&self, context: &str) {
        let per_subcommand = SUBCOMMAND_NAMES
            .iter()
            .zip(self.subcommands)
            .map(|(name, count)| format!("{name}={count}"))
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            context,
            chunks = self.chunks,
            frames = self.frames,
            bad = self.bad_checksum,
            ignored = self.ignored,
            malformed = self.malformed,
            rendered = self.rendered,
            throttled = self.throttled,
            render_errors = self.render_errors,
            forwarded = self.forwarded,
            noise = self.noise_bytes,
            "link stats: {per_subcommand}"
        );
    }
}

/// Fires once per interval
#[derive(Debug, Clone)]
pub struct StatsTicker {
    interval: Duration,
    next: Instant,
}

impl StatsTicker {
    /// First tick one `interval` after `now`
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now + interval,
        }
    }

    /// True when the interval has elapsed since the last tick
    ///
    /// Missed ticks are not replayed.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.interval;
        true
    }
}
