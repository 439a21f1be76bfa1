use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::commands::ShellCommand;
use super::state::ControlState;
use crate::audio::DeviceDescriptor;
use crate::errors::{RecorderError, Result};
use crate::session::{RecordingSession, RecordingSummary, SessionCommand, SessionState};

// ============================================================================
// Reply Types
// ============================================================================

/// Outcome of a shell command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Started { path: PathBuf },
    Paused,
    Resumed,
    Stopped { summary: RecordingSummary },
    Saved { summary: RecordingSummary },
    Discarded { blocks: usize },
    Status { status: StatusView },
    Device { device: Option<DeviceDescriptor> },
    Quit,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub state: SessionState,
    pub filename: Option<String>,
    pub elapsed: Duration,
    /// Audio from a failed stop is waiting for `save` or `discard`
    pub unsaved: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Run one shell command against the current session
pub async fn handle(state: &mut ControlState, command: ShellCommand) -> Result<Reply> {
    match command {
        ShellCommand::Start { file } => start(state, file).await,
        ShellCommand::Pause => toggle_pause(state).await,
        ShellCommand::Resume => resume(state).await,
        ShellCommand::Stop => stop(state).await,
        ShellCommand::Save { file } => save(state, &file).await,
        ShellCommand::Discard => discard(state).await,
        ShellCommand::Status => Ok(Reply::Status {
            status: status(state).await,
        }),
        ShellCommand::Device => Ok(Reply::Device {
            device: state.factory.descriptor().cloned(),
        }),
        ShellCommand::Quit => request_shutdown(state).await.map(|()| Reply::Quit),
    }
}

/// Start a new recording. Resumes instead when the current one is paused.
async fn start(state: &mut ControlState, file: Option<PathBuf>) -> Result<Reply> {
    if let Some(session) = &state.session {
        match session.state() {
            SessionState::Paused => {
                if file.is_some() {
                    warn!("Ignoring file name, resuming the paused recording");
                }
                session.resume().await?;
                return Ok(Reply::Resumed);
            }
            SessionState::Recording => {
                return Err(RecorderError::InvalidState {
                    command: SessionCommand::Start,
                    state: SessionState::Recording,
                })
            }
            SessionState::Idle | SessionState::Stopped => {}
        }
        if session.has_unsaved_audio().await {
            return Err(RecorderError::UnsavedAudio);
        }
    }

    let path = file.unwrap_or_else(|| state.output_dir.join(default_file_name()));

    let backend = state.factory.create()?;
    let session = RecordingSession::with_events(
        state.session_config.renewed(),
        backend,
        state.events.clone(),
    )?;
    session.start(&path).await?;

    if let Some(previous) = state.session.replace(session) {
        previous.shutdown().await?;
    }

    Ok(Reply::Started { path })
}

/// Pause, or resume when already paused
async fn toggle_pause(state: &mut ControlState) -> Result<Reply> {
    let session = current(state, SessionCommand::Pause)?;
    if session.state() == SessionState::Paused {
        session.resume().await?;
        return Ok(Reply::Resumed);
    }
    session.pause().await?;
    Ok(Reply::Paused)
}

async fn resume(state: &mut ControlState) -> Result<Reply> {
    current(state, SessionCommand::Resume)?.resume().await?;
    Ok(Reply::Resumed)
}

async fn stop(state: &mut ControlState) -> Result<Reply> {
    let session = state.session.as_ref().ok_or(RecorderError::NothingToStop)?;
    let summary = session.stop().await?;
    Ok(Reply::Stopped { summary })
}

async fn save(state: &mut ControlState, file: &Path) -> Result<Reply> {
    let session = state.session.as_ref().ok_or(RecorderError::NothingToSave)?;
    let summary = session.save_as(file).await?;
    Ok(Reply::Saved { summary })
}

async fn discard(state: &mut ControlState) -> Result<Reply> {
    let session = state.session.as_ref().ok_or(RecorderError::NothingToSave)?;
    let blocks = session.discard().await?;
    Ok(Reply::Discarded { blocks })
}

async fn status(state: &ControlState) -> StatusView {
    match &state.session {
        Some(session) => StatusView {
            state: session.state(),
            filename: session.path().await.map(|path| crate::session::display_name(&path)),
            elapsed: session.elapsed().await,
            unsaved: session.has_unsaved_audio().await,
        },
        None => StatusView {
            state: SessionState::Idle,
            filename: None,
            elapsed: Duration::ZERO,
            unsaved: false,
        },
    }
}

/// Quit request (command or Ctrl+C). Refused while a recording is active.
pub async fn request_shutdown(state: &mut ControlState) -> Result<()> {
    let Some(session) = &state.session else {
        return Ok(());
    };

    if let Err(e) = session.shutdown().await {
        warn!("Shutdown rejected: {}", e);
        return Err(e);
    }
    if session.has_unsaved_audio().await {
        warn!("Exiting with unsaved audio from session {}", session.id());
    }

    info!("Recorder shut down");
    Ok(())
}

/// End of input: stop and save an active recording, then shut down
pub async fn finish_input(state: &mut ControlState) -> Result<Option<RecordingSummary>> {
    let summary = match &state.session {
        Some(session) if session.state().is_active() => {
            info!("Input closed, stopping the recording");
            Some(session.stop().await?)
        }
        _ => None,
    };

    request_shutdown(state).await?;
    Ok(summary)
}

/// `recording-YYYYMMDD-HHMMSS.wav` in local time
pub fn default_file_name() -> String {
    format!("recording-{}.wav", Local::now().format("%Y%m%d-%H%M%S"))
}

fn current(state: &ControlState, command: SessionCommand) -> Result<&RecordingSession> {
    state.session.as_ref().ok_or(RecorderError::InvalidState {
        command,
        state: SessionState::Idle,
    })
}
