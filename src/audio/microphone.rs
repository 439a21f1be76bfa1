// Microphone capture through cpal
//
// cpal streams are not `Send` on every platform, so the stream lives on a
// dedicated device thread for its whole life. The session talks to that
// thread over a command channel and the thread blocks on `recv` between
// commands.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioFrame, DeviceDescriptor, FrameSink};
use crate::errors::{RecorderError, Result};

/// Describe the OS default input device.
///
/// Channel count is the maximum the device offers at its default rate.
pub fn query_default_device(fallback_sample_rate: u32) -> Result<DeviceDescriptor> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecorderError::DeviceUnavailable("no default input device".to_string()))?;

    let name = device
        .name()
        .unwrap_or_else(|_| "Unknown input device".to_string());

    let default_config = device.default_input_config().ok();
    let sample_rate = default_config
        .as_ref()
        .map(|c| c.sample_rate().0)
        .unwrap_or(fallback_sample_rate);

    let widest = device
        .supported_input_configs()
        .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to query {name}: {e}")))?
        .filter(|range| {
            range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate
        })
        .map(|range| range.channels())
        .max();

    let channels = widest
        .or_else(|| default_config.as_ref().map(|c| c.channels()))
        .ok_or_else(|| {
            RecorderError::DeviceUnavailable(format!("{name} offers no input at {sample_rate}Hz"))
        })?;

    Ok(DeviceDescriptor {
        name,
        channels,
        sample_rate,
    })
}

#[derive(Debug)]
enum DeviceCommand {
    Pause,
    Resume,
    Close,
}

/// Default input device backend
pub struct CpalBackend {
    descriptor: DeviceDescriptor,
    commands: Option<std_mpsc::Sender<DeviceCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalBackend {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            commands: None,
            thread: None,
        }
    }

    fn send(&self, command: DeviceCommand) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                warn!("Device thread already exited");
            }
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    async fn open(&mut self, sink: FrameSink) -> Result<()> {
        if self.commands.is_some() {
            return Err(RecorderError::DeviceUnavailable(
                "input stream already open".to_string(),
            ));
        }

        info!(
            "Opening {} ({}Hz, {} channels)",
            self.descriptor.name, self.descriptor.sample_rate, self.descriptor.channels
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let (commands_tx, commands_rx) = std_mpsc::channel();
        let descriptor = self.descriptor.clone();

        let thread = thread::Builder::new()
            .name("capture-device".to_string())
            .spawn(move || run_device(descriptor, sink, ready_tx, commands_rx))?;

        let opened = ready_rx.await.unwrap_or_else(|_| {
            Err(RecorderError::DeviceUnavailable(
                "device thread exited before opening the stream".to_string(),
            ))
        });

        match opened {
            Ok(()) => {
                self.commands = Some(commands_tx);
                self.thread = Some(thread);
                info!("Input stream started");
                Ok(())
            }
            Err(e) => {
                let _ = tokio::task::spawn_blocking(move || thread.join()).await;
                Err(e)
            }
        }
    }

    async fn pause(&mut self) -> Result<()> {
        self.send(DeviceCommand::Pause);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.send(DeviceCommand::Resume);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.send(DeviceCommand::Close);
        self.commands = None;

        if let Some(thread) = self.thread.take() {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => info!("Input stream released"),
                Ok(Err(_)) => error!("Device thread panicked"),
                Err(e) => error!("Failed to join device thread: {}", e),
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.commands.is_some()
    }

    fn name(&self) -> &str {
        "cpal default input"
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        // Without a join: the thread drops its stream as soon as it sees Close
        self.send(DeviceCommand::Close);
    }
}

fn run_device(
    descriptor: DeviceDescriptor,
    sink: FrameSink,
    ready: oneshot::Sender<Result<()>>,
    commands: std_mpsc::Receiver<DeviceCommand>,
) {
    let stream = match build_stream(&descriptor, sink.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(RecorderError::DeviceUnavailable(format!(
            "failed to start input stream: {e}"
        ))));
        return;
    }

    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(command) = commands.recv() {
        debug!("Device command: {:?}", command);
        match command {
            DeviceCommand::Pause => {
                if let Err(e) = stream.pause() {
                    // Blocks are gated while paused, so a stream that keeps running only costs CPU
                    warn!("Failed to suspend input stream: {}", e);
                }
            }
            DeviceCommand::Resume => {
                if let Err(e) = stream.play() {
                    sink.fault(format!("failed to resume input stream: {e}"));
                }
            }
            DeviceCommand::Close => break,
        }
    }

    drop(stream);
    debug!("Device thread exiting");
}

fn build_stream(descriptor: &DeviceDescriptor, sink: FrameSink) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecorderError::DeviceUnavailable("no default input device".to_string()))?;

    let name = device.name().unwrap_or_default();
    if name != descriptor.name {
        return Err(RecorderError::DeviceUnavailable(format!(
            "default input changed from {} to {}",
            descriptor.name, name
        )));
    }

    let sample_format = device
        .supported_input_configs()
        .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to query {name}: {e}")))?
        .find(|range| {
            range.channels() == descriptor.channels
                && range.min_sample_rate().0 <= descriptor.sample_rate
                && range.max_sample_rate().0 >= descriptor.sample_rate
        })
        .map(|range| range.sample_format())
        .ok_or_else(|| {
            RecorderError::DeviceUnavailable(format!(
                "{name} cannot capture {} channels at {}Hz",
                descriptor.channels, descriptor.sample_rate
            ))
        })?;

    let config = cpal::StreamConfig {
        channels: descriptor.channels,
        sample_rate: cpal::SampleRate(descriptor.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, sink),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, sink),
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, sink),
        cpal::SampleFormat::I32 => build_input::<i32>(&device, &config, sink),
        other => {
            return Err(RecorderError::DeviceUnavailable(format!(
                "unsupported sample format {other:?}"
            )))
        }
    };

    stream.map_err(|e| RecorderError::DeviceUnavailable(format!("failed to build input stream: {e}")))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: FrameSink,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let opened_at = Instant::now();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let error_sink = sink.clone();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if !sink.is_open() {
                return;
            }
            sink.push(AudioFrame {
                samples: data.iter().map(|&s| f32::from_sample(s)).collect(),
                sample_rate,
                channels,
                timestamp_ms: opened_at.elapsed().as_millis() as u64,
            });
        },
        move |err| {
            error!("Input stream error: {}", err);
            error_sink.fault(err.to_string());
        },
        None,
    )
}
