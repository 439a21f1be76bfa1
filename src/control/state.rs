use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::audio::AudioBackendFactory;
use crate::session::{RecordingSession, SessionConfig, SessionEvent, EVENT_CAPACITY};

/// Everything the command handlers need between commands
pub struct ControlState {
    /// Backend source, device described once at startup
    pub factory: AudioBackendFactory,

    /// Template for each new session (a fresh ID is drawn per recording)
    pub session_config: SessionConfig,

    /// Directory for default-named recordings
    pub output_dir: PathBuf,

    /// Shared by every session so the shell keeps one subscription
    pub events: broadcast::Sender<SessionEvent>,

    /// Current or most recent session
    pub session: Option<RecordingSession>,
}

impl ControlState {
    pub fn new(factory: AudioBackendFactory, session_config: SessionConfig, output_dir: PathBuf) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            factory,
            session_config,
            output_dir,
            events,
            session: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
