use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier, used in logs and events
    pub session_id: String,

    /// Output bit depth (16 or 24)
    pub bits_per_sample: u16,

    /// How often elapsed time is reported while recording
    /// Default: 1 second
    pub tick_interval: Duration,
}

impl SessionConfig {
    /// Same settings under a fresh session ID
    pub fn renewed(&self) -> Self {
        Self {
            session_id: new_session_id(),
            ..self.clone()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: new_session_id(),
            bits_per_sample: 24,
            tick_interval: Duration::from_secs(1),
        }
    }
}

fn new_session_id() -> String {
    format!("recording-{}", uuid::Uuid::new_v4())
}
