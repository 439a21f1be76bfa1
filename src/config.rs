use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{AudioSource, SyntheticConfig};
use crate::session::SessionConfig;

/// File consulted when no `--config` is given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "config/mic-recorder";

/// Prefix for environment overrides, e.g. `MIC_RECORDER__AUDIO__SOURCE=synthetic`
pub const ENV_PREFIX: &str = "MIC_RECORDER";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    /// Where default-named recordings go (`~` is expanded)
    pub output_dir: String,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Microphone,
    Synthetic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub source: SourceKind,
    pub bits_per_sample: u16,
    /// Used when the input device reports no default rate
    pub fallback_sample_rate: u32,
    pub synthetic: SyntheticSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_ms: u64,
    pub frequency_hz: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level: error, warn, info, debug, trace
    pub level: String,
}

impl Config {
    /// Defaults, then the config file, then `MIC_RECORDER__*` variables.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .set_default("recorder.output_dir", ".")?
            .set_default("recorder.tick_interval_ms", 1000)?
            .set_default("audio.source", "microphone")?
            .set_default("audio.bits_per_sample", 24)?
            .set_default("audio.fallback_sample_rate", 44100)?
            .set_default("audio.synthetic.sample_rate", 16000)?
            .set_default("audio.synthetic.channels", 1)?
            .set_default("audio.synthetic.block_ms", 100)?
            .set_default("audio.synthetic.frequency_hz", 440.0)?
            .set_default("logging.level", "info")?
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.recorder.output_dir).into_owned())
    }

    pub fn audio_source(&self) -> AudioSource {
        match self.audio.source {
            SourceKind::Microphone => AudioSource::Microphone {
                fallback_sample_rate: self.audio.fallback_sample_rate,
            },
            SourceKind::Synthetic => AudioSource::Synthetic(self.audio.synthetic.to_config()),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            bits_per_sample: self.audio.bits_per_sample,
            tick_interval: Duration::from_millis(self.recorder.tick_interval_ms.max(1)),
            ..SessionConfig::default()
        }
    }
}

impl SyntheticSettings {
    pub fn to_config(&self) -> SyntheticConfig {
        let block_period = Duration::from_millis(self.block_ms.max(1));
        SyntheticConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_frames: (self.sample_rate as u64 * block_period.as_millis() as u64 / 1000) as usize,
            block_period,
            frequency_hz: self.frequency_hz,
            ..SyntheticConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Config::load(Some(&missing)).is_err());

        let cfg = Config::load(None).unwrap();
        assert_eq!(cfg.audio.bits_per_sample, 24);
        assert_eq!(cfg.audio.fallback_sample_rate, 44100);
        assert_eq!(cfg.recorder.tick_interval_ms, 1000);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recorder.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[recorder]\noutput_dir = \"~/takes\"\n\n[audio]\nsource = \"synthetic\"\nbits_per_sample = 16\n\n[audio.synthetic]\nsample_rate = 8000\nblock_ms = 50"
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.audio.source, SourceKind::Synthetic);
        assert_eq!(cfg.session_config().bits_per_sample, 16);
        assert!(cfg.output_dir().ends_with("takes"));

        match cfg.audio_source() {
            AudioSource::Synthetic(synthetic) => {
                assert_eq!(synthetic.sample_rate, 8000);
                assert_eq!(synthetic.block_frames, 400);
            }
            other => panic!("expected synthetic source, got {:?}", other),
        }
    }
}
