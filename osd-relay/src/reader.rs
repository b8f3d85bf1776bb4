//! Frame reader over a link
//!
//! Wraps a [`LinkRx`] and a [`FrameParser`]: bytes are read in chunks,
//! fed to the parser, and complete frames handed out one at a time. Bytes
//! after a frame stay buffered for the next call, so several frames in one
//! datagram or serial read are all delivered.
//!
//! A frame that starts but never finishes (a dropped byte on a serial line)
//! would otherwise swallow the start of the next one. Once a partial frame
//! is older than the frame timeout the parser is reset and hunting for a
//! marker starts over.
//!
//! On a datagram link every read is a whole message, so a frame can never
//! continue into the next read. [`FrameReader::datagrams`] makes the reader
//! drop any partial frame as soon as a new datagram arrives.

use std::time::{Duration, Instant};

use osd_hal::LinkRx;
use osd_protocol::{Frame, FrameParser};
use tracing::debug;

use crate::transport::DATAGRAM_SIZE;

/// Upper bound on reads spent draining a link
const MAX_DRAIN_READS: usize = 64;

/// Buffered frame reader
pub struct FrameReader<R> {
    link: R,
    parser: FrameParser,
    buf: Vec<u8>,
    /// Unparsed bytes are `buf[start..end]`
    start: usize,
    end: usize,
    read_timeout: Duration,
    frame_timeout: Duration,
    /// When the current partial frame began
    partial_since: Option<Instant>,
    /// Each read is a self-contained datagram
    datagrams: bool,
    chunks: u64,
    expired: u64,
}

impl<R: LinkRx> FrameReader<R> {
    /// Create a reader waiting at most `read_timeout` per link read
    ///
    /// Partial frames are dropped after `frame_timeout`.
    pub fn new(link: R, read_timeout: Duration, frame_timeout: Duration) -> Self {
        Self {
            link,
            parser: FrameParser::new(),
            buf: vec![0; DATAGRAM_SIZE],
            start: 0,
            end: 0,
            read_timeout,
            frame_timeout,
            partial_since: None,
            datagrams: false,
            chunks: 0,
            expired: 0,
        }
    }

    /// Treat every read as a whole datagram
    ///
    /// A frame cut off at the end of one datagram is dropped instead of
    /// being continued by the next one.
    pub fn datagrams(mut self) -> Self {
        self.datagrams = true;
        self
    }

    /// Next frame, waiting for at most one link read
    ///
    /// `Ok(None)` means the read timed out or the bytes read did not finish
    /// a frame.
    pub fn poll(&mut self) -> Result<Option<Frame>, R::Error> {
        if let Some(frame) = self.drain() {
            return Ok(Some(frame));
        }
        self.fill(self.read_timeout)?;
        Ok(self.drain())
    }

    /// Next frame, giving up at `deadline`
    pub fn next_frame_before(&mut self, deadline: Instant) -> Result<Option<Frame>, R::Error> {
        loop {
            if let Some(frame) = self.drain() {
                return Ok(Some(frame));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.fill((deadline - now).min(self.read_timeout))?;
        }
    }

    /// Throw away buffered bytes, any partial frame, and whatever the link
    /// has already received
    pub fn discard_pending(&mut self) -> Result<(), R::Error> {
        self.start = 0;
        self.end = 0;
        self.parser.reset();
        self.partial_since = None;

        for _ in 0..MAX_DRAIN_READS {
            if self.link.read_timeout(&mut self.buf, Duration::ZERO)? == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Non-empty reads so far
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Bytes skipped while looking for a frame marker
    pub fn noise_bytes(&self) -> u64 {
        self.parser.discarded()
    }

    /// Partial frames dropped on timeout or at a datagram boundary
    pub fn expired(&self) -> u64 {
        self.expired
    }

    /// The underlying link
    pub fn link_mut(&mut self) -> &mut R {
        &mut self.link
    }

    /// Read one chunk into the empty buffer
    fn fill(&mut self, timeout: Duration) -> Result<(), R::Error> {
        self.expire_partial();

        let n = self.link.read_timeout(&mut self.buf, timeout)?;
        self.start = 0;
        self.end = n;
        if n > 0 {
            self.chunks += 1;
            if self.datagrams {
                if self.parser.in_progress() {
                    debug!("datagram ended inside a frame");
                    self.expired += 1;
                }
                // Also forgets a marker prefix left at the end of the last one
                self.parser.reset();
                self.partial_since = None;
            }
        } else {
            self.expire_partial();
        }
        Ok(())
    }

    /// Feed buffered bytes until a frame completes or the buffer is empty
    fn drain(&mut self) -> Option<Frame> {
        if self.start == self.end {
            return None;
        }

        let (frame, used) = self.parser.feed_bytes(&self.buf[self.start..self.end]);
        self.start += used;

        if frame.is_some() {
            self.partial_since = None;
        }
        if self.parser.in_progress() && self.partial_since.is_none() {
            self.partial_since = Some(Instant::now());
        }
        frame
    }

    fn expire_partial(&mut self) {
        let Some(since) = self.partial_since else {
            return;
        };
        if since.elapsed() >= self.frame_timeout {
            debug!("partial frame timed out");
            self.parser.reset();
            self.partial_since = None;
            self.expired += 1;
        }
    }
}
