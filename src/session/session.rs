use super::clock::ElapsedClock;
use super::config::SessionConfig;
use super::state::{SessionCommand, SessionEvent, SessionState};
use super::stats::{display_name, RecordingSummary};
use crate::audio::{create_output, AudioBackend, AudioFrame, FrameBuffer, FrameSink, PcmFormat, WavWriter};
use crate::errors::{RecorderError, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

/// Capacity of the event channel handed to the presentation shell
pub const EVENT_CAPACITY: usize = 64;

/// A single recording: one device stream, one buffer, one output file.
///
/// Commands take `&self` so the session can be shared with the tasks it
/// spawns. The state lives in a `watch` channel: the capture sink reads it to
/// decide whether a block is kept, and the elapsed ticker waits on it.
pub struct RecordingSession {
    shared: Arc<Shared>,

    /// Elapsed ticker and fault watcher
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    config: SessionConfig,
    format: PcmFormat,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    clock: Mutex<ElapsedClock>,
    inner: Mutex<Inner>,
}

struct Inner {
    backend: Box<dyn AudioBackend>,
    path: Option<PathBuf>,
    /// Created exclusively at start, written at stop
    output: Option<File>,
    collector: Option<JoinHandle<FrameBuffer>>,
    /// Audio kept after a failed write
    unsaved: Option<Unsaved>,
}

struct Unsaved {
    buffer: FrameBuffer,
    elapsed: Duration,
}

enum Output {
    Reserved(File, PathBuf),
    Fresh(PathBuf),
}

impl RecordingSession {
    /// Create an idle session with its own event channel
    pub fn new(config: SessionConfig, backend: Box<dyn AudioBackend>) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::with_events(config, backend, events)
    }

    /// Create an idle session publishing to an existing event channel
    pub fn with_events(
        config: SessionConfig,
        backend: Box<dyn AudioBackend>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self> {
        let descriptor = backend.descriptor();
        let format = PcmFormat::new(descriptor.sample_rate, descriptor.channels, config.bits_per_sample)?;

        info!(
            "Creating recording session: {} ({} via {})",
            config.session_id,
            descriptor.name,
            backend.name()
        );

        let (state, _) = watch::channel(SessionState::Idle);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                format,
                state,
                events,
                clock: Mutex::new(ElapsedClock::new()),
                inner: Mutex::new(Inner {
                    backend,
                    path: None,
                    output: None,
                    collector: None,
                    unsaved: None,
                }),
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.shared.config.session_id
    }

    pub fn state(&self) -> SessionState {
        self.shared.current()
    }

    /// Recording time so far, pauses excluded
    pub async fn elapsed(&self) -> Duration {
        self.shared.clock.lock().await.elapsed(Instant::now())
    }

    pub async fn path(&self) -> Option<PathBuf> {
        self.shared.inner.lock().await.path.clone()
    }

    pub async fn has_unsaved_audio(&self) -> bool {
        self.shared.inner.lock().await.unsaved.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Create `path` and start capturing into it
    pub async fn start(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut inner = self.shared.inner.lock().await;
        let next = self.state().next(SessionCommand::Start)?;

        if path.as_os_str().is_empty() {
            return Err(RecorderError::EmptyPath);
        }

        let output = create_output(path)?;

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        let sink = FrameSink::new(self.shared.state.subscribe(), frames_tx, faults_tx);

        if let Err(e) = inner.backend.open(sink).await {
            drop(output);
            if let Err(remove_err) = fs::remove_file(path) {
                warn!("Failed to remove {}: {}", path.display(), remove_err);
            }
            warn!("Failed to start recording session {}: {}", self.id(), e);
            return Err(e);
        }

        inner.path = Some(path.to_path_buf());
        inner.output = Some(output);
        inner.collector = Some(tokio::spawn(collect(frames_rx)));

        self.shared.clock.lock().await.start_segment(Instant::now());
        self.shared.state.send_replace(next);

        {
            let mut tasks = self.tasks.lock().await;
            tasks.push(tokio::spawn(report_elapsed(
                Arc::clone(&self.shared),
                self.shared.state.subscribe(),
            )));
            tasks.push(tokio::spawn(watch_faults(Arc::clone(&self.shared), faults_rx)));
        }

        info!("Recording started: {}", path.display());
        self.shared.announce(inner.path.as_deref()).await;

        Ok(())
    }

    /// Freeze the clock and suspend the device stream
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        let next = self.state().next(SessionCommand::Pause)?;

        self.shared.state.send_replace(next);
        let elapsed = self.shared.clock.lock().await.pause(Instant::now());

        if let Err(e) = inner.backend.pause().await {
            warn!("Failed to suspend {}: {}", inner.backend.name(), e);
        }

        info!("Recording paused at {:.1}s", elapsed.as_secs_f64());
        self.shared.announce(inner.path.as_deref()).await;

        Ok(())
    }

    /// Resume the device stream and open a new clock segment
    pub async fn resume(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        let next = self.state().next(SessionCommand::Resume)?;

        inner.backend.resume().await?;
        self.shared.clock.lock().await.resume(Instant::now());
        self.shared.state.send_replace(next);

        info!("Recording resumed");
        self.shared.announce(inner.path.as_deref()).await;

        Ok(())
    }

    /// Stop capturing and write the WAV file.
    ///
    /// Returns once the file is flushed and closed. On a write failure the
    /// audio stays in memory; see [`save_as`](Self::save_as).
    pub async fn stop(&self) -> Result<RecordingSummary> {
        let mut inner = self.shared.inner.lock().await;
        self.state().next(SessionCommand::Stop)?;
        self.shared.finish(&mut inner).await
    }

    /// Write audio kept from a failed stop to a new file
    pub async fn save_as(&self, path: impl AsRef<Path>) -> Result<RecordingSummary> {
        let path = path.as_ref();
        let mut inner = self.shared.inner.lock().await;

        if path.as_os_str().is_empty() {
            return Err(RecorderError::EmptyPath);
        }
        let Unsaved { buffer, elapsed } = inner.unsaved.take().ok_or(RecorderError::NothingToSave)?;

        let (buffer, written) = flush(self.shared.format, Output::Fresh(path.to_path_buf()), buffer).await;
        match written {
            Ok(data_bytes) => {
                inner.path = Some(path.to_path_buf());
                self.shared.announce(inner.path.as_deref()).await;
                Ok(RecordingSummary {
                    path: path.to_path_buf(),
                    elapsed,
                    blocks: buffer.len(),
                    data_bytes,
                    format: self.shared.format,
                    saved_at: Utc::now(),
                })
            }
            Err(e) => {
                inner.unsaved = Some(Unsaved { buffer, elapsed });
                Err(e)
            }
        }
    }

    /// Drop audio kept from a failed stop. Returns the number of blocks dropped.
    pub async fn discard(&self) -> Result<usize> {
        let mut inner = self.shared.inner.lock().await;
        let unsaved = inner.unsaved.take().ok_or(RecorderError::NothingToSave)?;
        warn!("Discarding {} unsaved blocks", unsaved.buffer.len());
        Ok(unsaved.buffer.len())
    }

    /// Wait for the session's tasks to finish. Refused while recording or paused.
    pub async fn shutdown(&self) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            return Err(RecorderError::ShutdownRejected(state));
        }

        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                warn!("Session task failed: {}", e);
            }
        }

        debug!("Session {} shut down", self.id());
        Ok(())
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        let state = self.state();
        if state.is_active() {
            warn!("Session {} dropped while {}, buffered audio is lost", self.id(), state);
        }
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl Shared {
    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    async fn announce(&self, path: Option<&Path>) {
        let elapsed = self.clock.lock().await.elapsed(Instant::now());
        let _ = self.events.send(SessionEvent::StateChanged {
            session_id: self.config.session_id.clone(),
            state: self.current(),
            filename: path.map(display_name),
            elapsed,
            at: Utc::now(),
        });
    }

    /// Close the device, drain the buffer into the output file, end in `Stopped`
    async fn finish(&self, inner: &mut Inner) -> Result<RecordingSummary> {
        let elapsed = self.clock.lock().await.pause(Instant::now());

        if let Err(e) = inner.backend.close().await {
            warn!("Failed to close {}: {}", inner.backend.name(), e);
        }

        // The device has dropped its sink, so the collector sees the end of the queue
        let buffer = match inner.collector.take() {
            Some(collector) => collector.await.unwrap_or_else(|e| {
                error!("Frame collector failed: {}", e);
                FrameBuffer::new()
            }),
            None => FrameBuffer::new(),
        };

        let path = inner.path.clone().unwrap_or_default();
        let output = match inner.output.take() {
            Some(file) => Output::Reserved(file, path.clone()),
            None => Output::Fresh(path.clone()),
        };

        let (mut buffer, written) = flush(self.format, output, buffer).await;
        let result = match written {
            Ok(data_bytes) => {
                let blocks = buffer.len();
                buffer.clear();
                info!(
                    "Recording session complete: {} ({:.1}s, {} blocks)",
                    self.config.session_id,
                    elapsed.as_secs_f64(),
                    blocks
                );
                Ok(RecordingSummary {
                    path,
                    elapsed,
                    blocks,
                    data_bytes,
                    format: self.format,
                    saved_at: Utc::now(),
                })
            }
            Err(e) => {
                error!("Failed to save recording, keeping {} blocks in memory: {}", buffer.len(), e);
                inner.unsaved = Some(Unsaved { buffer, elapsed });
                Err(e)
            }
        };

        self.clock.lock().await.reset();
        self.state.send_replace(SessionState::Stopped);
        self.announce(inner.path.as_deref()).await;

        result
    }
}

/// Write `buffer` on the blocking pool. The buffer comes back so a failed
/// write can keep it.
async fn flush(format: PcmFormat, output: Output, buffer: FrameBuffer) -> (FrameBuffer, Result<u64>) {
    let path = match &output {
        Output::Reserved(_, path) | Output::Fresh(path) => path.clone(),
    };

    let task = tokio::task::spawn_blocking(move || {
        let writer = WavWriter::new(format);
        let written = match output {
            Output::Reserved(file, path) => writer.write_reserved(file, &path, &buffer),
            Output::Fresh(path) => writer.write_path(&path, &buffer),
        };
        (buffer, written)
    });

    match task.await {
        Ok(done) => done,
        Err(e) => (
            FrameBuffer::new(),
            Err(RecorderError::IoWrite {
                path,
                source: io::Error::new(io::ErrorKind::Other, format!("writer task failed: {e}")),
            }),
        ),
    }
}

async fn collect(mut frames: mpsc::UnboundedReceiver<AudioFrame>) -> FrameBuffer {
    let mut buffer = FrameBuffer::new();
    while let Some(frame) = frames.recv().await {
        buffer.push(frame);
    }
    debug!("Frame collector drained {} blocks", buffer.len());
    buffer
}

/// Publish elapsed time every tick while recording
async fn report_elapsed(shared: Arc<Shared>, mut state: watch::Receiver<SessionState>) {
    let period = shared.config.tick_interval;

    loop {
        let current = *state.borrow_and_update();
        match current {
            SessionState::Recording => {
                let mut ticks = time::interval_at(Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = ticks.tick() => {
                            let elapsed = shared.clock.lock().await.elapsed(Instant::now());
                            let _ = shared.events.send(SessionEvent::ElapsedTick {
                                session_id: shared.config.session_id.clone(),
                                elapsed,
                            });
                        }
                        changed = state.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            break;
                        }
                    }
                }
            }
            SessionState::Idle | SessionState::Paused => {
                if state.changed().await.is_err() {
                    return;
                }
            }
            SessionState::Stopped => return,
        }
    }
}

/// End the session if the device reports a fault while it is active
async fn watch_faults(shared: Arc<Shared>, mut faults: mpsc::UnboundedReceiver<String>) {
    let Some(message) = faults.recv().await else {
        return;
    };

    let mut inner = shared.inner.lock().await;
    if !shared.current().is_active() {
        debug!("Ignoring device fault after stop: {}", message);
        return;
    }

    error!("Capture device fault in {}: {}", shared.config.session_id, message);
    let _ = shared.events.send(SessionEvent::Fault {
        session_id: shared.config.session_id.clone(),
        message,
    });

    match shared.finish(&mut inner).await {
        Ok(summary) => warn!(
            "Recording cut short, saved {:.1}s to {}",
            summary.elapsed.as_secs_f64(),
            summary.path.display()
        ),
        Err(e) => error!("Recording cut short and not saved: {}", e),
    }
}

#[cfg(test)]
impl RecordingSession {
    /// Give up the reserved file and aim the final write at `path`
    pub(crate) async fn retarget_output(&self, path: &Path) {
        let mut inner = self.shared.inner.lock().await;
        if let (Some(file), Some(reserved)) = (inner.output.take(), inner.path.take()) {
            drop(file);
            fs::remove_file(&reserved).unwrap();
        }
        inner.path = Some(path.to_path_buf());
    }
}
