use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::{RecorderError, Result};

/// Lifecycle of a single recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    /// Terminal. A new session is needed for the next file.
    Stopped,
}

impl SessionState {
    /// Recording or paused: the device is held and audio is buffered.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    /// Validate `command` against this state and return the state it leads to.
    pub fn next(self, command: SessionCommand) -> Result<SessionState> {
        match (self, command) {
            (Self::Idle, SessionCommand::Start) => Ok(Self::Recording),
            (Self::Recording, SessionCommand::Pause) => Ok(Self::Paused),
            (Self::Paused, SessionCommand::Resume) => Ok(Self::Recording),
            (Self::Recording | Self::Paused, SessionCommand::Stop) => Ok(Self::Stopped),
            (Self::Idle | Self::Stopped, SessionCommand::Stop) => Err(RecorderError::NothingToStop),
            (state, command) => Err(RecorderError::InvalidState { command, state }),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Commands accepted by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Notifications published to the presentation shell
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        session_id: String,
        state: SessionState,
        /// File name (without directory) of the session's target, if any
        filename: Option<String>,
        elapsed: Duration,
        at: DateTime<Utc>,
    },
    ElapsedTick {
        session_id: String,
        elapsed: Duration,
    },
    Fault {
        session_id: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_only_from_idle() {
        assert_eq!(SessionState::Idle.next(SessionCommand::Start).unwrap(), SessionState::Recording);
        for state in [SessionState::Recording, SessionState::Paused, SessionState::Stopped] {
            let err = state.next(SessionCommand::Start).unwrap_err();
            assert!(matches!(err, RecorderError::InvalidState { command: SessionCommand::Start, .. }));
        }
    }

    #[test]
    fn pause_resume_cycle() {
        let paused = SessionState::Recording.next(SessionCommand::Pause).unwrap();
        assert_eq!(paused, SessionState::Paused);
        assert_eq!(paused.next(SessionCommand::Resume).unwrap(), SessionState::Recording);
    }

    #[test]
    fn pause_before_start_is_invalid() {
        let err = SessionState::Idle.next(SessionCommand::Pause).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::InvalidState { command: SessionCommand::Pause, state: SessionState::Idle }
        ));
    }

    #[test]
    fn resume_while_recording_is_invalid() {
        assert!(SessionState::Recording.next(SessionCommand::Resume).is_err());
    }

    #[test]
    fn stop_without_recording_is_nothing_to_stop() {
        for state in [SessionState::Idle, SessionState::Stopped] {
            assert!(matches!(state.next(SessionCommand::Stop), Err(RecorderError::NothingToStop)));
        }
        assert_eq!(SessionState::Paused.next(SessionCommand::Stop).unwrap(), SessionState::Stopped);
    }

    #[test]
    fn tick_event_serializes_with_tag() {
        let event = SessionEvent::ElapsedTick {
            session_id: "s".to_string(),
            elapsed: Duration::from_secs(2),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"elapsed_tick\""));
    }
}
