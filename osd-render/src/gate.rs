//! Frame-rate gate
//!
//! Flight controllers commit frames faster than an overlay consumer needs
//! them. The gate lets a draw-screen through only when the canvas is dirty
//! and the minimum interval since the last successful render has elapsed.
//! Draws arriving too early are dropped, not queued; the next draw-screen
//! supersedes them.
//!
//! Time is passed in by the caller so the gate stays deterministic.

use std::time::{Duration, Instant};

/// Default render ceiling
pub const DEFAULT_FPS: f64 = 20.0;

/// Outcome of a draw request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Render now, then call [`FrameGate::complete`]
    Render,
    /// Too soon after the previous render; dropped
    Throttled,
    /// Nothing changed since the last render
    Clean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    PendingRender,
}

/// Two-state render throttle
#[derive(Debug, Clone)]
pub struct FrameGate {
    state: GateState,
    min_interval: Duration,
    last_render: Option<Instant>,
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

impl FrameGate {
    /// Create a gate allowing at most `fps` renders per second
    ///
    /// Rates below 1 fps (and NaN) are treated as 1 fps.
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_nan() { 1.0 } else { fps.max(1.0) };
        Self {
            state: GateState::Idle,
            min_interval: Duration::from_secs_f64(1.0 / fps),
            last_render: None,
        }
    }

    /// Minimum time between two renders
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time of the last successful render
    pub fn last_render(&self) -> Option<Instant> {
        self.last_render
    }

    /// True between a `Render` decision and `complete`/`abandon`
    pub fn is_pending(&self) -> bool {
        self.state == GateState::PendingRender
    }

    /// Ask to render a committed frame at `now`
    pub fn request(&mut self, dirty: bool, now: Instant) -> GateDecision {
        if !dirty {
            return GateDecision::Clean;
        }

        let due = match self.last_render {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        };
        if !due {
            return GateDecision::Throttled;
        }

        self.state = GateState::PendingRender;
        GateDecision::Render
    }

    /// Record a successful render at `now`
    pub fn complete(&mut self, now: Instant) {
        self.state = GateState::Idle;
        self.last_render = Some(now);
    }

    /// Give up on a pending render without touching the timestamp
    pub fn abandon(&mut self) {
        self.state = GateState::Idle;
    }
}
