use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::synthetic::{SyntheticBackend, SyntheticConfig};
use crate::errors::Result;
use crate::session::SessionState;

/// A block of captured audio (f32 PCM normalised to [-1.0, 1.0], interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples, interleaved by channel
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the device was opened
    pub timestamp_ms: u64,
}

/// Snapshot of the input device, taken once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    /// Maximum input channel count the device supports at `sample_rate`
    pub channels: u16,
    /// Native (default) sample rate in Hz
    pub sample_rate: u32,
}

/// Where a backend delivers captured blocks.
///
/// Blocks are only enqueued while the session is `Recording`; anything a
/// device hands over in any other state is dropped here.
#[derive(Debug, Clone)]
pub struct FrameSink {
    gate: watch::Receiver<SessionState>,
    frames: mpsc::UnboundedSender<AudioFrame>,
    faults: mpsc::UnboundedSender<String>,
}

impl FrameSink {
    pub fn new(
        gate: watch::Receiver<SessionState>,
        frames: mpsc::UnboundedSender<AudioFrame>,
        faults: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            gate,
            frames,
            faults,
        }
    }

    /// Whether a block delivered now would be kept
    pub fn is_open(&self) -> bool {
        *self.gate.borrow() == SessionState::Recording
    }

    /// Enqueue a block. Returns false if it was discarded.
    pub fn push(&self, frame: AudioFrame) -> bool {
        if !self.is_open() {
            return false;
        }
        self.frames.send(frame).is_ok()
    }

    /// Report an unrecoverable device error
    pub fn fault(&self, message: impl Into<String>) {
        let _ = self.faults.send(message.into());
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device, stream owned by a device thread
/// - Synthetic: generated tone in fixed-size blocks (tests, no-microphone runs)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// The device this backend captures from
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Open the device at the descriptor's rate and channel count and start
    /// delivering blocks into `sink`
    async fn open(&mut self, sink: FrameSink) -> Result<()>;

    /// Suspend the device stream (it stays open)
    async fn pause(&mut self) -> Result<()>;

    /// Resume a suspended stream
    async fn resume(&mut self) -> Result<()>;

    /// Release the device. Safe to call in any state; returns once the device
    /// has let go of the sink.
    async fn close(&mut self) -> Result<()>;

    /// Check if the device is currently open
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Default input device (all platforms)
    Microphone {
        /// Used when the device reports no default rate
        fallback_sample_rate: u32,
    },
    /// Generated tone
    Synthetic(SyntheticConfig),
}

/// Creates one backend per session from a device descriptor captured once
pub struct AudioBackendFactory {
    source: AudioSource,
    descriptor: Option<DeviceDescriptor>,
}

impl AudioBackendFactory {
    /// Query the device for `source`. A failed query is not fatal: it is
    /// retried when the next backend is requested.
    pub fn new(source: AudioSource) -> Self {
        let descriptor = match Self::describe(&source) {
            Ok(descriptor) => {
                info!(
                    "Input device: {} ({}Hz, {} channels)",
                    descriptor.name, descriptor.sample_rate, descriptor.channels
                );
                Some(descriptor)
            }
            Err(e) => {
                warn!("No usable input device at startup: {}", e);
                None
            }
        };

        Self { source, descriptor }
    }

    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Create a backend for a new session
    pub fn create(&mut self) -> Result<Box<dyn AudioBackend>> {
        let descriptor = match &self.descriptor {
            Some(descriptor) => descriptor.clone(),
            None => {
                let descriptor = Self::describe(&self.source)?;
                self.descriptor = Some(descriptor.clone());
                descriptor
            }
        };

        match &self.source {
            AudioSource::Microphone { .. } => {
                Ok(Box::new(super::microphone::CpalBackend::new(descriptor)))
            }
            AudioSource::Synthetic(config) => {
                Ok(Box::new(SyntheticBackend::new(config.clone())))
            }
        }
    }

    fn describe(source: &AudioSource) -> Result<DeviceDescriptor> {
        match source {
            AudioSource::Microphone {
                fallback_sample_rate,
            } => super::microphone::query_default_device(*fallback_sample_rate),
            AudioSource::Synthetic(config) => Ok(config.descriptor()),
        }
    }
}
