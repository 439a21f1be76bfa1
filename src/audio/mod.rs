pub mod backend;
pub mod buffer;
pub mod file;
pub mod microphone;
pub mod synthetic;
pub mod wav;

pub use backend::{AudioBackend, AudioBackendFactory, AudioFrame, AudioSource, DeviceDescriptor, FrameSink};
pub use buffer::FrameBuffer;
pub use file::AudioFile;
pub use microphone::{query_default_device, CpalBackend};
pub use synthetic::{SyntheticBackend, SyntheticConfig};
pub use wav::{create_output, PcmFormat, WavWriter};
