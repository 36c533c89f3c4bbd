use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::pcm::{self, CAPTURE_BLOCK_SAMPLES, INPUT_SAMPLE_RATE};

/// One block of captured mono samples at the input rate, in [-1, 1]
pub type CaptureBlock = Vec<f32>;

/// Where microphone audio comes from
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureInput {
    /// Live microphone device
    Microphone,
    /// Replay a WAV fixture as if it were live input (testing/batch)
    WavFile(PathBuf),
}

/// Audio capture source trait
///
/// Implementations deliver fixed-size blocks of mono float samples at the
/// input sample rate over a channel for the lifetime of an active session.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start capturing
    ///
    /// Returns a channel receiver that will receive sample blocks
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>>;

    /// Stop capturing
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Capture source factory
pub struct CaptureSourceFactory;

impl CaptureSourceFactory {
    pub fn create(input: CaptureInput) -> Result<Box<dyn CaptureSource>> {
        match input {
            CaptureInput::Microphone => {
                anyhow::bail!(
                    "Microphone capture requires a platform audio device; \
                     configure a WAV capture source on headless hosts"
                )
            }
            CaptureInput::WavFile(path) => Ok(Box::new(WavCaptureSource::new(path))),
        }
    }
}

/// Replays a 16kHz mono WAV fixture as paced capture blocks, one block per
/// real-time block interval, stopping when the file is drained
pub struct WavCaptureSource {
    path: PathBuf,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WavCaptureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn read_samples(path: &PathBuf) -> Result<Vec<f32>> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV fixture: {:?}", path))?;

        let spec = reader.spec();
        if spec.channels != pcm::CHANNELS
            || spec.sample_rate != INPUT_SAMPLE_RATE
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
        {
            anyhow::bail!(
                "Expected {}Hz mono 16-bit fixture, got {}Hz {}ch {}-bit",
                INPUT_SAMPLE_RATE,
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample
            );
        }

        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        Ok(samples.iter().map(|&s| pcm::sample_to_f32(s)).collect())
    }
}

#[async_trait::async_trait]
impl CaptureSource for WavCaptureSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureBlock>> {
        let samples = Self::read_samples(&self.path)?;

        info!(
            "WAV capture source started: {:?} ({:.1}s of audio)",
            self.path,
            pcm::duration_secs(samples.len(), INPUT_SAMPLE_RATE)
        );

        let (tx, rx) = mpsc::channel(8);
        self.capturing.store(true, Ordering::SeqCst);

        let capturing = Arc::clone(&self.capturing);
        let task = tokio::spawn(async move {
            let block_duration =
                Duration::from_secs_f64(pcm::duration_secs(CAPTURE_BLOCK_SAMPLES, INPUT_SAMPLE_RATE));
            let mut ticker = tokio::time::interval(block_duration);

            for block in samples.chunks(CAPTURE_BLOCK_SAMPLES) {
                ticker.tick().await;

                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                if tx.send(block.to_vec()).await.is_err() {
                    break;
                }
            }

            capturing.store(false, Ordering::SeqCst);
            info!("WAV capture source drained");
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("WAV capture task panicked: {}", e);
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
