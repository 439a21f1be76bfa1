use std::path::PathBuf;
use thiserror::Error;

use crate::session::{SessionCommand, SessionState};

/// Errors reported by the recorder core.
///
/// Every variant is meant to be shown to the user; none of them should end the
/// process.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("{} already exists, choose another file name", .0.display())]
    AlreadyExists(PathBuf),

    #[error("A destination file path is required")]
    EmptyPath,

    #[error("Cannot {command} while {state}: {}", state_hint(.command, .state))]
    InvalidState {
        command: SessionCommand,
        state: SessionState,
    },

    #[error("Nothing to stop")]
    NothingToStop,

    #[error("Failed to write {}: {source}", path.display())]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported bit depth {0}, expected 16 or 24")]
    UnsupportedBitDepth(u16),

    #[error("No unsaved audio to write")]
    NothingToSave,

    #[error("The last recording was not saved, save or discard it first")]
    UnsavedAudio,

    #[error("Recording is {0}, stop it before exiting")]
    ShutdownRejected(SessionState),

    #[error("Capture device fault: {0}")]
    DeviceFault(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// Informational outcomes that should be displayed as a notice, not an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::NothingToStop | Self::NothingToSave)
    }
}

fn state_hint(command: &SessionCommand, state: &SessionState) -> &'static str {
    match (command, state) {
        (SessionCommand::Start, SessionState::Recording | SessionState::Paused) => {
            "a recording is already underway"
        }
        (SessionCommand::Start, SessionState::Stopped) => {
            "this session is finished, start a new one"
        }
        (SessionCommand::Pause, SessionState::Paused) => "already paused",
        (SessionCommand::Pause, _) => "must start before pausing",
        (SessionCommand::Resume, SessionState::Recording) => "already recording",
        (SessionCommand::Resume, _) => "nothing is paused",
        _ => "command not allowed in this state",
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
