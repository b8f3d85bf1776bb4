//! Serial → UDP forward task
//!
//! Talks MSP to a flight controller over a serial link and relays its
//! replies to the renderer. After proving the link with two version
//! requests, it polls the DisplayPort candidates round-robin; different
//! firmware releases answer on different commands. Every valid `$M>`
//! frame seen in the window after a poll is sent on as one datagram.
//!
//! Frames are checked here: bad checksums and anything that is not a
//! response stay on the serial side and only show up in the counters.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use osd_hal::{LinkRx, LinkTx};
use osd_protocol::messages::{MSP_API_VERSION, MSP_FC_VERSION};
use osd_protocol::{msp_request, Direction, Frame};
use tracing::{debug, info, warn};

use crate::config::ForwardConfig;
use crate::error::RelayError;
use crate::reader::FrameReader;
use crate::stats::{LinkStats, StatsTicker};
use crate::transport::{SerialLink, UdpSender};

/// A request sent while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCandidate {
    pub name: &'static str,
    pub command: u8,
    pub payload: &'static [u8],
}

/// DisplayPort poll requests, in rotation order
pub const POLL_CANDIDATES: [PollCandidate; 3] = [
    PollCandidate {
        name: "DP_CMD_BC",
        command: 0xBC,
        payload: &[],
    },
    PollCandidate {
        name: "DP_CMD_BD",
        command: 0xBD,
        payload: &[0x00],
    },
    PollCandidate {
        name: "DP_CMD_BE",
        command: 0xBE,
        payload: &[0x00],
    },
];

/// Timing for one forwarder
#[derive(Debug, Clone, Copy)]
pub struct ForwardTiming {
    pub reply_timeout: Duration,
    pub poll_window: Duration,
    pub poll_interval: Duration,
}

impl From<&ForwardConfig> for ForwardTiming {
    fn from(config: &ForwardConfig) -> Self {
        Self {
            reply_timeout: Duration::from_millis(config.reply_timeout_ms),
            poll_window: Duration::from_millis(config.poll_window_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Serial poller relaying replies to a transmitter
pub struct Forwarder<L, T> {
    reader: FrameReader<L>,
    target: T,
    timing: ForwardTiming,
    stats: LinkStats,
    next_candidate: usize,
}

impl<L, T> Forwarder<L, T>
where
    L: LinkRx<Error = io::Error> + LinkTx<Error = io::Error>,
    T: LinkTx<Error = io::Error>,
{
    pub fn new(reader: FrameReader<L>, target: T, timing: ForwardTiming) -> Self {
        Self {
            reader,
            target,
            timing,
            stats: LinkStats::default(),
            next_candidate: 0,
        }
    }

    /// Send a request on a quiet link and forward the first reply
    ///
    /// Returns whether a reply arrived within the reply timeout.
    pub fn probe(&mut self, label: &str, command: u8) -> Result<bool, RelayError> {
        self.reader.discard_pending()?;
        self.send_request(command, &[])?;

        let deadline = Instant::now() + self.timing.reply_timeout;
        while let Some(frame) = self.reader.next_frame_before(deadline)? {
            if self.forward(&frame)? {
                info!(label, bytes = frame.wire_len(), "probe reply forwarded");
                return Ok(true);
            }
        }

        warn!(label, "no reply to probe");
        Ok(false)
    }

    /// Send the next poll candidate and forward replies for one window
    ///
    /// Returns how many frames were forwarded.
    pub fn poll_once(&mut self) -> Result<u64, RelayError> {
        let candidate = POLL_CANDIDATES[self.next_candidate];
        self.next_candidate = (self.next_candidate + 1) % POLL_CANDIDATES.len();

        self.send_request(candidate.command, candidate.payload)?;

        let deadline = Instant::now() + self.timing.poll_window;
        let mut forwarded = 0;
        while let Some(frame) = self.reader.next_frame_before(deadline)? {
            if self.forward(&frame)? {
                forwarded += 1;
            }
        }

        if forwarded > 0 {
            debug!(candidate = candidate.name, forwarded, "replies forwarded");
        }
        Ok(forwarded)
    }

    /// Counters so far
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// The transmitter replies go to
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The serial link
    pub fn link_mut(&mut self) -> &mut L {
        self.reader.link_mut()
    }

    fn send_request(&mut self, command: u8, payload: &[u8]) -> Result<(), RelayError> {
        let request =
            msp_request(command, payload).map_err(|error| RelayError::Encode { command, error })?;
        let link = self.reader.link_mut();
        link.write_all(&request.encode_to_vec())?;
        link.flush()?;
        Ok(())
    }

    /// Relay `frame` if it is a valid response
    fn forward(&mut self, frame: &Frame) -> Result<bool, RelayError> {
        if !frame.checksum_valid {
            self.stats.bad_checksum += 1;
            debug!(command = frame.command, "bad checksum, not forwarded");
            return Ok(false);
        }
        self.stats.frames += 1;

        if frame.direction != Direction::Response {
            self.stats.ignored += 1;
            return Ok(false);
        }

        self.target.write_all(&frame.encode_to_vec())?;
        self.stats.forwarded += 1;
        Ok(true)
    }

    fn sync_link(&mut self) {
        self.stats.chunks = self.reader.chunks();
        self.stats.noise_bytes = self.reader.noise_bytes();
    }
}

/// Probe the link, then poll for `max_polls` cycles (forever if `None`)
pub fn relay<L, T>(
    forwarder: &mut Forwarder<L, T>,
    ticker: &mut StatsTicker,
    max_polls: Option<u64>,
) -> Result<(), RelayError>
where
    L: LinkRx<Error = io::Error> + LinkTx<Error = io::Error>,
    T: LinkTx<Error = io::Error>,
{
    forwarder.probe("API_VERSION", MSP_API_VERSION)?;
    forwarder.probe("FC_VERSION", MSP_FC_VERSION)?;

    let mut polls = 0u64;
    while max_polls.map_or(true, |max| polls < max) {
        forwarder.poll_once()?;
        polls += 1;

        if ticker.due(Instant::now()) {
            forwarder.sync_link();
            forwarder.stats().log("forward");
        }
        thread::sleep(forwarder.timing.poll_interval);
    }

    forwarder.sync_link();
    Ok(())
}

/// Run the forward mode
pub fn run(config: &ForwardConfig, max_polls: Option<u64>) -> Result<LinkStats, RelayError> {
    let serial =
        SerialLink::open(&config.device, config.baud).map_err(|source| RelayError::Device {
            path: config.device.clone(),
            source,
        })?;
    let target = UdpSender::connect(&config.udp_host, config.udp_port).map_err(|source| {
        RelayError::Socket {
            addr: format!("{}:{}", config.udp_host, config.udp_port),
            source,
        }
    })?;

    info!(
        device = %config.device.display(),
        baud = config.baud,
        target = %target.target(),
        "forwarding MSP replies"
    );

    let reader = FrameReader::new(
        serial,
        Duration::from_millis(config.read_timeout_ms),
        Duration::from_millis(config.frame_timeout_ms),
    );
    let mut forwarder = Forwarder::new(reader, target, ForwardTiming::from(config));
    let mut ticker = StatsTicker::new(config.stats_interval(), Instant::now());

    relay(&mut forwarder, &mut ticker, max_polls)?;

    forwarder.stats().log("forward finished");
    Ok(forwarder.stats().clone())
}
