use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use super::buffer::FrameBuffer;
use crate::errors::{RecorderError, Result};

/// Size of the canonical RIFF/WAVE header written before the samples
pub const HEADER_LEN: u64 = 44;

/// Output sample layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Result<Self> {
        if !matches!(bits_per_sample, 16 | 24) {
            return Err(RecorderError::UnsupportedBitDepth(bits_per_sample));
        }
        if channels == 0 || sample_rate == 0 {
            return Err(RecorderError::DeviceUnavailable(format!(
                "device offers {channels} channels at {sample_rate}Hz"
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            bits_per_sample,
        })
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Create `path` for writing, refusing to overwrite anything already there
pub fn create_output(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => RecorderError::AlreadyExists(path.to_path_buf()),
            _ => RecorderError::IoWrite {
                path: path.to_path_buf(),
                source: e,
            },
        })
}

/// Serialises a whole recording as linear-PCM WAV.
///
/// All blocks are known up front, so the header carries exact sizes and
/// nothing is patched afterwards.
#[derive(Debug, Clone, Copy)]
pub struct WavWriter {
    format: PcmFormat,
}

impl WavWriter {
    pub fn new(format: PcmFormat) -> Self {
        Self { format }
    }

    /// Bytes the `data` chunk will hold for `buffer`
    pub fn data_len(&self, buffer: &FrameBuffer) -> u64 {
        buffer.sample_count() as u64 * self.format.bytes_per_sample() as u64
    }

    /// Write header and samples to `out`. Returns the `data` chunk length.
    pub fn write_to<W: Write>(&self, mut out: W, buffer: &FrameBuffer) -> io::Result<u64> {
        let data_len = self.data_len(buffer);
        let data_len_u32 = u32::try_from(data_len)
            .ok()
            .filter(|len| len.checked_add(36).is_some())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "recording too large for a WAV file")
            })?;

        out.write_all(&self.header(data_len_u32))?;

        let width = self.format.bytes_per_sample() as usize;
        let mut bytes = Vec::new();
        for block in buffer.iter() {
            bytes.clear();
            bytes.reserve(block.samples.len() * width);
            for &sample in &block.samples {
                self.encode(sample, &mut bytes);
            }
            out.write_all(&bytes)?;
        }
        out.flush()?;

        debug!("Wrote {} blocks, {} data bytes", buffer.len(), data_len);
        Ok(data_len)
    }

    /// Write to an already-created file, then sync and close it
    pub fn write_file(&self, file: File, buffer: &FrameBuffer) -> io::Result<u64> {
        let mut out = BufWriter::new(file);
        let data_len = self.write_to(&mut out, buffer)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(data_len)
    }

    /// Write into `file`, previously created at `path`. A partial file is
    /// removed on failure.
    pub fn write_reserved(&self, file: File, path: &Path, buffer: &FrameBuffer) -> Result<u64> {
        match self.write_file(file, buffer) {
            Ok(data_len) => {
                info!("Saved {} ({} data bytes)", path.display(), data_len);
                Ok(data_len)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(path) {
                    warn!("Failed to remove partial file {}: {}", path.display(), remove_err);
                }
                Err(RecorderError::IoWrite {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    /// Create `path` exclusively and write the recording into it
    pub fn write_path(&self, path: &Path, buffer: &FrameBuffer) -> Result<u64> {
        let file = create_output(path)?;
        self.write_reserved(file, path, buffer)
    }

    fn header(&self, data_len: u32) -> [u8; HEADER_LEN as usize] {
        let f = &self.format;
        let mut header = [0u8; HEADER_LEN as usize];

        // RIFF chunk descriptor
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        // fmt sub-chunk
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes()); // PCM fmt chunk size
        header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
        header[22..24].copy_from_slice(&f.channels.to_le_bytes());
        header[24..28].copy_from_slice(&f.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&f.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&f.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&f.bits_per_sample.to_le_bytes());

        // data sub-chunk header
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&data_len.to_le_bytes());

        header
    }

    fn encode(&self, sample: f32, out: &mut Vec<u8>) {
        let sample = sample.clamp(-1.0, 1.0);
        match self.format.bits_per_sample {
            16 => {
                let value = (sample * i16::MAX as f32) as i16;
                out.extend_from_slice(&value.to_le_bytes());
            }
            _ => {
                let value = (sample * 8_388_607.0) as i32;
                out.extend_from_slice(&value.to_le_bytes()[..3]);
            }
        }
    }
}
