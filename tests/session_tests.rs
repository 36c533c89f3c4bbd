// Lifecycle tests for the session controller: setup failure must revert to
// idle, and teardown must be safe from any state.

use std::sync::Arc;
use zephyr_live::audio::pcm::{CAPTURE_BLOCK_SAMPLES, INPUT_SAMPLE_RATE};
use zephyr_live::{
    CaptureInput, CueService, LiveSession, OutputTarget, SessionConfig, SessionState,
    SynthCueService,
};

fn test_cues() -> Arc<dyn CueService> {
    Arc::new(SynthCueService::new())
}

fn fixture_wav(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: INPUT_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..CAPTURE_BLOCK_SAMPLES {
        writer.write_sample(100i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[tokio::test]
async fn test_new_session_is_idle() {
    let session = LiveSession::new(SessionConfig::default(), test_cues()).unwrap();
    let status = session.status().await;

    assert_eq!(status.state, SessionState::Idle);
    assert!(!status.started);
    assert!(!status.connected);
    assert!(!status.speaking);
    assert_eq!(status.frames_sent, 0);
    assert_eq!(status.chunks_scheduled, 0);
    assert_eq!(status.transcript_chars, 0);
}

#[tokio::test]
async fn test_close_without_start_is_safe() {
    let session = LiveSession::new(SessionConfig::default(), test_cues()).unwrap();

    let status = session.close().await;
    assert_eq!(status.state, SessionState::Closed);

    // Idempotent: closing again is also fine
    let status = session.close().await;
    assert_eq!(status.state, SessionState::Closed);
}

#[tokio::test]
async fn test_start_failure_reverts_to_idle() {
    let dir = tempfile::tempdir().unwrap();

    // Nothing listens on this port; connection setup must fail fast
    let config = SessionConfig {
        endpoint: "ws://127.0.0.1:9".to_string(),
        capture: CaptureInput::WavFile(fixture_wav(&dir)),
        output: OutputTarget::Null,
        ..Default::default()
    };

    let session = LiveSession::new(config, test_cues()).unwrap();
    assert!(session.start().await.is_err());

    let status = session.status().await;
    assert_eq!(status.state, SessionState::Idle);
    assert!(!status.started);
    assert!(!status.connected);
    assert_eq!(status.frames_sent, 0);
}

#[tokio::test]
async fn test_start_failure_with_bad_capture_source() {
    // Microphone capture is unavailable on headless hosts; start must fail
    // before touching the network and revert to idle
    let config = SessionConfig {
        capture: CaptureInput::Microphone,
        ..Default::default()
    };

    let session = LiveSession::new(config, test_cues()).unwrap();
    assert!(session.start().await.is_err());
    assert_eq!(session.status().await.state, SessionState::Idle);
}

#[tokio::test]
async fn test_transcript_starts_empty() {
    let session = LiveSession::new(SessionConfig::default(), test_cues()).unwrap();
    assert_eq!(session.transcript().await, "");
}

#[tokio::test]
async fn test_wav_output_target_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("replies.wav");

    let config = SessionConfig {
        output: OutputTarget::WavFile(out.clone()),
        ..Default::default()
    };

    let session = LiveSession::new(config, test_cues()).unwrap();
    session.close().await;

    assert!(out.exists());
}
