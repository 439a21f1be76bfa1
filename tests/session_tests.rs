// Integration tests for the recording session state machine
//
// The synthetic source stands in for the microphone. Time is paused, so
// sleeps advance the tokio clock deterministically.

use anyhow::Result;
use mic_recorder::audio::{SyntheticBackend, SyntheticConfig};
use mic_recorder::{RecorderError, RecordingSession, SessionConfig, SessionEvent, SessionState};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

const BLOCK_FRAMES: usize = 160;

fn tone(channels: u16) -> SyntheticConfig {
    // 100ms blocks at 1600Hz
    SyntheticConfig {
        sample_rate: 1600,
        channels,
        block_frames: BLOCK_FRAMES,
        block_period: Duration::from_millis(100),
        ..SyntheticConfig::default()
    }
}

fn session_with(source: SyntheticConfig, bits_per_sample: u16) -> Result<RecordingSession> {
    let config = SessionConfig {
        bits_per_sample,
        ..SessionConfig::default()
    };
    Ok(RecordingSession::new(config, Box::new(SyntheticBackend::new(source)))?)
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[tokio::test(start_paused = true)]
async fn test_pause_excluded_from_elapsed_and_audio() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("scenario.wav");
    let session = session_with(tone(1), 16)?;

    session.start(&path).await?;
    sleep(Duration::from_secs(2)).await;
    session.pause().await?;
    assert_eq!(session.state(), SessionState::Paused);

    sleep(Duration::from_secs(3)).await;
    let frozen = session.elapsed().await;
    assert!((frozen.as_secs_f64() - 2.0).abs() < 0.2, "elapsed froze at {:?}", frozen);

    session.resume().await?;
    sleep(Duration::from_secs(2)).await;
    let summary = session.stop().await?;

    assert_eq!(session.state(), SessionState::Stopped);
    assert!((summary.elapsed.as_secs_f64() - 4.0).abs() < 1.0, "elapsed was {:?}", summary.elapsed);
    assert!((summary.audio_duration().as_secs_f64() - 4.0).abs() < 0.25, "audio was {:?}", summary.audio_duration());
    assert_eq!(session.elapsed().await, Duration::ZERO);

    let reader = hound::WavReader::open(&path)?;
    assert_eq!(reader.len() as usize, summary.blocks * BLOCK_FRAMES);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_block_count_conservation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("blocks.wav");
    let session = session_with(
        SyntheticConfig {
            max_blocks: Some(25),
            ..tone(2)
        },
        24,
    )?;

    session.start(&path).await?;
    sleep(Duration::from_secs(5)).await;
    let summary = session.stop().await?;

    let expected = 25 * BLOCK_FRAMES as u64 * 3 * 2;
    assert_eq!(summary.blocks, 25);
    assert_eq!(summary.data_bytes, expected);

    let bytes = std::fs::read(&path)?;
    assert_eq!(bytes.len() as u64, 44 + expected);
    assert_eq!(u32_at(&bytes, 4) as u64, expected + 36);
    assert_eq!(u32_at(&bytes, 40) as u64, expected);

    Ok(())
}

#[tokio::test]
async fn test_stop_from_idle_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let session = session_with(tone(1), 16)?;

    let err = session.stop().await.unwrap_err();
    assert!(matches!(err, RecorderError::NothingToStop));
    assert!(err.is_warning());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let first = temp_dir.path().join("first.wav");
    let second = temp_dir.path().join("second.wav");
    let session = session_with(tone(1), 16)?;

    session.start(&first).await?;
    let err = session.start(&second).await.unwrap_err();
    assert!(matches!(err, RecorderError::InvalidState { .. }));
    assert!(err.to_string().contains("already underway"));
    assert!(!second.exists());
    assert_eq!(session.path().await.as_deref(), Some(first.as_path()));

    sleep(Duration::from_millis(500)).await;
    session.stop().await?;
    assert!(first.exists());

    Ok(())
}

#[tokio::test]
async fn test_start_refuses_existing_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("existing.wav");
    std::fs::write(&path, b"keep me")?;
    let session = session_with(tone(1), 16)?;

    let err = session.start(&path).await.unwrap_err();
    assert!(matches!(err, RecorderError::AlreadyExists(ref p) if p == &path));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(std::fs::read(&path)?, b"keep me");

    Ok(())
}

#[tokio::test]
async fn test_start_requires_a_path() -> Result<()> {
    let session = session_with(tone(1), 16)?;
    let err = session.start(Path::new("")).await.unwrap_err();
    assert!(matches!(err, RecorderError::EmptyPath));
    Ok(())
}

#[tokio::test]
async fn test_device_unavailable_leaves_no_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("nodevice.wav");
    let session = session_with(
        SyntheticConfig {
            fail_open: true,
            ..tone(1)
        },
        16,
    )?;

    let err = session.start(&path).await.unwrap_err();
    assert!(matches!(err, RecorderError::DeviceUnavailable(_)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!path.exists());

    Ok(())
}

#[tokio::test]
async fn test_pause_before_start_is_invalid() -> Result<()> {
    let session = session_with(tone(1), 16)?;
    let err = session.pause().await.unwrap_err();
    assert!(err.to_string().contains("must start before pausing"));
    assert!(session.resume().await.is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_device_fault_stops_and_flushes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("fault.wav");
    let session = session_with(
        SyntheticConfig {
            fault_after: Some(5),
            ..tone(1)
        },
        16,
    )?;
    let mut events = session.subscribe();

    session.start(&path).await?;

    let mut saw_fault = false;
    timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Fault { .. }) => saw_fault = true,
                Ok(SessionEvent::StateChanged {
                    state: SessionState::Stopped,
                    ..
                }) => break,
                Ok(_) => {}
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await?;

    assert!(saw_fault);
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(matches!(session.stop().await, Err(RecorderError::NothingToStop)));

    let reader = hound::WavReader::open(&path)?;
    assert_eq!(reader.len() as usize, 5 * BLOCK_FRAMES);

    session.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_ticks_only_while_recording() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("ticks.wav");
    let session = session_with(tone(1), 16)?;
    let mut events = session.subscribe();

    session.start(&path).await?;
    sleep(Duration::from_millis(3_500)).await;
    session.pause().await?;
    sleep(Duration::from_secs(5)).await;
    session.stop().await?;

    let mut ticks = Vec::new();
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ElapsedTick { elapsed, .. } => ticks.push(elapsed),
            SessionEvent::StateChanged { state, filename, .. } => {
                assert_eq!(filename.as_deref(), Some("ticks.wav"));
                states.push(state);
            }
            SessionEvent::Fault { message, .. } => panic!("unexpected fault: {message}"),
        }
    }

    assert_eq!(ticks.len(), 3);
    assert!((ticks[2].as_secs_f64() - 3.0).abs() < 0.01, "last tick at {:?}", ticks[2]);
    assert_eq!(states, vec![SessionState::Recording, SessionState::Paused, SessionState::Stopped]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_rejected_while_active() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let session = session_with(tone(1), 16)?;

    session.start(temp_dir.path().join("busy.wav")).await?;
    session.pause().await?;
    let err = session.shutdown().await.unwrap_err();
    assert!(matches!(err, RecorderError::ShutdownRejected(SessionState::Paused)));

    session.stop().await?;
    session.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_nothing_to_save_or_discard_after_clean_stop() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let session = session_with(tone(1), 16)?;

    session.start(temp_dir.path().join("clean.wav")).await?;
    session.stop().await?;

    assert!(!session.has_unsaved_audio().await);
    assert!(matches!(
        session.save_as(temp_dir.path().join("copy.wav")).await,
        Err(RecorderError::NothingToSave)
    ));
    assert!(matches!(session.discard().await, Err(RecorderError::NothingToSave)));

    Ok(())
}
