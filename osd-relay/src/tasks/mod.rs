//! Relay modes
//!
//! Each mode owns its links and runs a blocking loop on the calling
//! thread.

pub mod forward;
pub mod render;

pub use forward::{relay, Forwarder, ForwardTiming, PollCandidate, POLL_CANDIDATES};
pub use render::{serve, RenderSession};
