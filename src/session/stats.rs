use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::PcmFormat;

/// Result of a finished recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSummary {
    /// Where the WAV file was written
    pub path: PathBuf,

    /// Recording time, pauses excluded
    pub elapsed: Duration,

    /// Number of captured blocks written
    pub blocks: usize,

    /// Size of the `data` chunk in bytes
    pub data_bytes: u64,

    pub format: PcmFormat,

    /// When the file was closed
    pub saved_at: DateTime<Utc>,
}

impl RecordingSummary {
    /// Duration of the audio actually in the file
    pub fn audio_duration(&self) -> Duration {
        let byte_rate = self.format.byte_rate();
        if byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.data_bytes as f64 / byte_rate as f64)
    }

    pub fn filename(&self) -> String {
        display_name(&self.path)
    }
}

pub(crate) fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_duration_from_data_bytes() {
        let summary = RecordingSummary {
            path: PathBuf::from("/tmp/take.wav"),
            elapsed: Duration::from_secs(4),
            blocks: 40,
            data_bytes: 16000 * 2 * 3 * 4, // 4s of 16kHz stereo 24-bit
            format: PcmFormat::new(16000, 2, 24).unwrap(),
            saved_at: Utc::now(),
        };
        assert!((summary.audio_duration().as_secs_f64() - 4.0).abs() < 1e-9);
        assert_eq!(summary.filename(), "take.wav");
    }
}
