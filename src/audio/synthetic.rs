// Synthetic capture source
//
// Emits a sine tone in fixed-size blocks at a fixed period, the way a device
// callback would. Used by the tests and for running without a microphone.

use std::f32::consts::TAU;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioFrame, DeviceDescriptor, FrameSink};
use crate::errors::{RecorderError, Result};

/// Configuration for the synthetic source
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample frames per block
    pub block_frames: usize,
    /// Delay between blocks
    pub block_period: Duration,
    /// Stop emitting after this many blocks (None = unlimited)
    pub max_blocks: Option<usize>,
    /// Report a device fault after this many blocks
    pub fault_after: Option<usize>,
    /// Make `open` fail as if the device were missing
    pub fail_open: bool,
    pub frequency_hz: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            block_frames: 1600,                        // 100ms at 16kHz
            block_period: Duration::from_millis(100),
            max_blocks: None,
            fault_after: None,
            fail_open: false,
            frequency_hz: 440.0,
        }
    }
}

impl SyntheticConfig {
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Synthetic tone".to_string(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}

#[derive(Debug)]
enum EmitterCommand {
    Pause,
    Resume,
    Close,
}

pub struct SyntheticBackend {
    config: SyntheticConfig,
    descriptor: DeviceDescriptor,
    commands: Option<mpsc::UnboundedSender<EmitterCommand>>,
    emitter: Option<JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        let descriptor = config.descriptor();
        Self {
            config,
            descriptor,
            commands: None,
            emitter: None,
        }
    }

    fn send(&self, command: EmitterCommand) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                warn!("Synthetic emitter already gone");
            }
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for SyntheticBackend {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    async fn open(&mut self, sink: FrameSink) -> Result<()> {
        if self.commands.is_some() {
            return Err(RecorderError::DeviceUnavailable(
                "synthetic source already open".to_string(),
            ));
        }
        if self.config.fail_open {
            return Err(RecorderError::DeviceUnavailable(
                "synthetic source configured to fail".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = tokio::spawn(emit(self.config.clone(), sink, rx));

        self.commands = Some(tx);
        self.emitter = Some(emitter);

        info!(
            "Synthetic source opened ({}Hz, {} channels, {} frames every {:?})",
            self.config.sample_rate,
            self.config.channels,
            self.config.block_frames,
            self.config.block_period
        );

        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.send(EmitterCommand::Pause);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.send(EmitterCommand::Resume);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.send(EmitterCommand::Close);
        self.commands = None;

        if let Some(emitter) = self.emitter.take() {
            if let Err(e) = emitter.await {
                warn!("Synthetic emitter panicked: {}", e);
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.commands.is_some()
    }

    fn name(&self) -> &str {
        "Synthetic tone"
    }
}

impl Drop for SyntheticBackend {
    fn drop(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            emitter.abort();
        }
    }
}

async fn emit(
    config: SyntheticConfig,
    sink: FrameSink,
    mut commands: mpsc::UnboundedReceiver<EmitterCommand>,
) {
    // First block arrives one period after opening, like a device buffer filling up
    let mut ticks = time::interval_at(Instant::now() + config.block_period, config.block_period);
    let mut paused = false;
    let mut faulted = false;
    let mut emitted = 0usize;
    let mut phase = 0.0f32;
    let step = TAU * config.frequency_hz / config.sample_rate.max(1) as f32;

    loop {
        let exhausted = config.max_blocks.is_some_and(|max| emitted >= max);

        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(EmitterCommand::Pause) => paused = true,
                Some(EmitterCommand::Resume) => {
                    paused = false;
                    ticks = time::interval_at(Instant::now() + config.block_period, config.block_period);
                }
                Some(EmitterCommand::Close) | None => break,
            },

            _ = ticks.tick(), if !paused && !faulted && !exhausted => {
                let mut samples = Vec::with_capacity(config.block_frames * config.channels as usize);
                for _ in 0..config.block_frames {
                    let value = 0.25 * phase.sin();
                    phase = (phase + step) % TAU;
                    samples.extend(std::iter::repeat(value).take(config.channels as usize));
                }

                let frame = AudioFrame {
                    samples,
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                    timestamp_ms: emitted as u64 * config.block_period.as_millis() as u64,
                };
                let kept = sink.push(frame);
                emitted += 1;
                debug!("Synthetic block {} ({})", emitted, if kept { "kept" } else { "gated" });

                if config.fault_after == Some(emitted) {
                    faulted = true;
                    sink.fault("synthetic device fault");
                }
            }
        }
    }

    debug!("Synthetic emitter stopped after {} blocks", emitted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use tokio::sync::watch;

    #[tokio::test(start_paused = true)]
    async fn emits_limited_blocks_then_closes() {
        let (_state_tx, state_rx) = watch::channel(SessionState::Recording);
        let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
        let (faults_tx, _faults_rx) = mpsc::unbounded_channel();

        let mut backend = SyntheticBackend::new(SyntheticConfig {
            block_frames: 10,
            block_period: Duration::from_millis(10),
            max_blocks: Some(3),
            ..SyntheticConfig::default()
        });
        backend
            .open(FrameSink::new(state_rx, frames_tx, faults_tx))
            .await
            .unwrap();
        assert!(backend.is_capturing());

        time::sleep(Duration::from_millis(500)).await;
        backend.close().await.unwrap();
        assert!(!backend.is_capturing());

        let mut count = 0;
        while let Some(frame) = frames_rx.recv().await {
            assert_eq!(frame.samples.len(), 10);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn fail_open_reports_device_unavailable() {
        let (_state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (frames_tx, _frames_rx) = mpsc::unbounded_channel();
        let (faults_tx, _faults_rx) = mpsc::unbounded_channel();

        let mut backend = SyntheticBackend::new(SyntheticConfig {
            fail_open: true,
            ..SyntheticConfig::default()
        });
        let err = backend
            .open(FrameSink::new(state_rx, frames_tx, faults_tx))
            .await
            .unwrap_err();
        assert!(matches!(err, RecorderError::DeviceUnavailable(_)));
        assert!(!backend.is_capturing());
    }
}
