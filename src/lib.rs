pub mod audio;
pub mod config;
pub mod control;
pub mod errors;
pub mod session;
pub mod shell;

pub use audio::{
    AudioBackend, AudioBackendFactory, AudioFile, AudioFrame, AudioSource, DeviceDescriptor,
    FrameBuffer, FrameSink, PcmFormat, SyntheticBackend, SyntheticConfig, WavWriter,
};
pub use config::Config;
pub use control::{ControlState, Reply, ShellCommand};
pub use errors::{RecorderError, Result};
pub use session::{
    ElapsedClock, RecordingSession, RecordingSummary, SessionCommand, SessionConfig, SessionEvent,
    SessionState,
};
pub use shell::{Presenter, TerminalPresenter};
