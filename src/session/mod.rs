//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that coordinates:
//! - The capture backend delivering PCM blocks
//! - The elapsed-time clock and its periodic tick
//! - Writing the buffered audio to a WAV file on stop

mod clock;
mod config;
mod session;
mod state;
mod stats;

pub use clock::ElapsedClock;
pub use config::SessionConfig;
pub use session::{RecordingSession, EVENT_CAPACITY};
pub use state::{SessionCommand, SessionEvent, SessionState};
pub use stats::RecordingSummary;
pub(crate) use stats::display_name;
