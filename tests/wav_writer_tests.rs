// Integration tests for WAV output
//
// Files written by WavWriter are read back with hound and AudioFile.

use anyhow::Result;
use mic_recorder::audio::{AudioFile, AudioFrame, FrameBuffer, PcmFormat, WavWriter};
use mic_recorder::RecorderError;
use tempfile::TempDir;

fn ramp_buffer(blocks: usize, frames: usize, channels: u16) -> FrameBuffer {
    let mut buffer = FrameBuffer::new();
    for block in 0..blocks {
        let samples = (0..frames * channels as usize)
            .map(|i| ((block * 7 + i) % 100) as f32 / 100.0 - 0.5)
            .collect();
        buffer.push(AudioFrame {
            samples,
            sample_rate: 8000,
            channels,
            timestamp_ms: block as u64 * 10,
        });
    }
    buffer
}

#[test]
fn test_24_bit_stereo_reads_back() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("stereo.wav");
    let buffer = ramp_buffer(4, 80, 2);

    let writer = WavWriter::new(PcmFormat::new(8000, 2, 24)?);
    let data_bytes = writer.write_path(&path, &buffer)?;
    assert_eq!(data_bytes, 4 * 80 * 2 * 3);

    let mut reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 8000);
    assert_eq!(spec.bits_per_sample, 24);

    let samples: Vec<i32> = reader.samples::<i32>().collect::<Result<_, _>>()?;
    let expected: Vec<i32> = buffer
        .iter()
        .flat_map(|frame| frame.samples.iter())
        .map(|&s| (s * 8_388_607.0) as i32)
        .collect();
    assert_eq!(samples, expected);

    Ok(())
}

#[test]
fn test_audio_file_reports_duration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("mono.wav");

    // 10 blocks of 800 frames at 8kHz = 1 second
    WavWriter::new(PcmFormat::new(8000, 1, 16)?).write_path(&path, &ramp_buffer(10, 800, 1))?;

    let audio = AudioFile::open(&path)?;
    assert!((audio.duration_seconds - 1.0).abs() < 1e-9);
    assert_eq!(audio.data_bytes(), 16000);
    assert_eq!(std::fs::metadata(&path)?.len(), 44 + 16000);

    Ok(())
}

#[test]
fn test_write_never_overwrites() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("taken.wav");
    let writer = WavWriter::new(PcmFormat::new(8000, 1, 16)?);

    writer.write_path(&path, &ramp_buffer(1, 10, 1))?;
    let before = std::fs::read(&path)?;

    let err = writer.write_path(&path, &ramp_buffer(5, 10, 1)).unwrap_err();
    assert!(matches!(err, RecorderError::AlreadyExists(_)));
    assert_eq!(std::fs::read(&path)?, before);

    Ok(())
}

#[test]
fn test_missing_directory_is_io_write() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("missing").join("out.wav");
    let writer = WavWriter::new(PcmFormat::new(8000, 1, 16)?);

    let err = writer.write_path(&path, &ramp_buffer(1, 10, 1)).unwrap_err();
    assert!(matches!(err, RecorderError::IoWrite { .. }));
    assert!(!path.exists());

    Ok(())
}
