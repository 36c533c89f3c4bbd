// Playback scheduling for streamed reply audio
//
// Inbound reply chunks arrive in bursts with no timing information of their
// own. The scheduler serializes them on a single monotonic clock: each chunk
// starts at max(end of previous chunk, device now), so chunks play in arrival
// order with no overlap and minimal gap. The clock variable is the queue.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

use super::pcm;

/// Identifies one scheduled chunk from schedule time until its completion
/// callback removes it from the active set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle(pub u64);

/// A chunk accepted by the scheduler: where it will play and for how long
#[derive(Debug, Clone, Copy)]
pub struct Scheduled {
    pub handle: ChunkHandle,
    /// Start time in seconds on the sink clock
    pub start_time: f64,
    /// Chunk duration in seconds
    pub duration: f64,
}

/// Audio output abstraction.
///
/// `now` is the device clock in seconds since the sink was created; `play`
/// queues mono samples to begin at `start_time` on that clock. Injecting a
/// fake sink makes the scheduler testable without an audio device.
pub trait OutputSink: Send {
    fn now(&self) -> f64;

    fn play(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        start_time: f64,
        handle: ChunkHandle,
    ) -> Result<()>;
}

/// Serializes an arbitrarily bursty chunk stream into gapless sequential
/// playback on an [`OutputSink`]
pub struct PlaybackScheduler {
    sink: Box<dyn OutputSink>,
    sample_rate: u32,

    /// End time of the last scheduled chunk; never moves backwards
    next_start_time: f64,

    /// Chunks scheduled but not yet finished playing
    active: HashSet<ChunkHandle>,

    next_handle: u64,
}

impl PlaybackScheduler {
    pub fn new(sink: Box<dyn OutputSink>, sample_rate: u32) -> Self {
        Self {
            sink,
            sample_rate,
            next_start_time: 0.0,
            active: HashSet::new(),
            next_handle: 0,
        }
    }

    /// Schedule decoded samples to play immediately after whatever is already
    /// queued. On sink failure the chunk is skipped and the clock does not
    /// advance.
    pub fn schedule(&mut self, samples: &[f32]) -> Result<Scheduled> {
        let handle = ChunkHandle(self.next_handle);
        let start_time = self.next_start_time.max(self.sink.now());
        let duration = pcm::duration_secs(samples.len(), self.sample_rate);

        self.sink
            .play(samples, self.sample_rate, start_time, handle)?;

        self.next_handle += 1;
        self.active.insert(handle);
        self.next_start_time = start_time + duration;

        debug!(
            "Scheduled chunk {:?}: start={:.3}s duration={:.3}s ({} active)",
            handle,
            start_time,
            duration,
            self.active.len()
        );

        Ok(Scheduled {
            handle,
            start_time,
            duration,
        })
    }

    /// Completion callback for a scheduled chunk
    pub fn on_chunk_finished(&mut self, handle: ChunkHandle) {
        self.active.remove(&handle);
    }

    /// True while any scheduled chunk has not yet finished playing
    pub fn is_speaking(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Current time on the sink clock
    pub fn sink_now(&self) -> f64 {
        self.sink.now()
    }
}

/// Output sink with a real wall clock that discards audio. Used when the
/// service runs headless and reply audio is only tracked, not rendered.
pub struct NullSink {
    epoch: Instant,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for NullSink {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn play(
        &mut self,
        samples: &[f32],
        _sample_rate: u32,
        start_time: f64,
        handle: ChunkHandle,
    ) -> Result<()> {
        debug!(
            "Null sink: chunk {:?} at {:.3}s ({} samples)",
            handle,
            start_time,
            samples.len()
        );
        Ok(())
    }
}

/// Renders the scheduled playback timeline to a WAV file, padding gaps
/// between chunks with silence. Scheduled starts are non-decreasing and
/// non-overlapping, so sequential writing is sufficient.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    epoch: Instant,
    sample_rate: u32,
    /// Samples written so far, including silence padding
    written: u64,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: pcm::CHANNELS,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path.as_ref(), spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path.as_ref()))?;

        Ok(Self {
            writer: Some(writer),
            epoch: Instant::now(),
            sample_rate,
            written: 0,
        })
    }

    pub fn finalize(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(())
    }
}

impl OutputSink for WavSink {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn play(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        start_time: f64,
        _handle: ChunkHandle,
    ) -> Result<()> {
        if sample_rate != self.sample_rate {
            bail!(
                "Chunk sample rate {} does not match sink rate {}",
                sample_rate,
                self.sample_rate
            );
        }

        let writer = self.writer.as_mut().context("WAV sink already finalized")?;

        // Pad with silence up to the scheduled start
        let start_sample = (start_time * self.sample_rate as f64) as u64;
        while self.written < start_sample {
            writer.write_sample(0i16).context("Failed to write silence")?;
            self.written += 1;
        }

        for &sample in samples {
            writer
                .write_sample(pcm::sample_to_i16(sample))
                .context("Failed to write sample to WAV")?;
            self.written += 1;
        }

        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV sink on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Fake sink with a manually driven clock
    struct FakeSink {
        clock: Arc<Mutex<f64>>,
        plays: Arc<Mutex<Vec<(ChunkHandle, f64)>>>,
        fail: bool,
    }

    fn fake_scheduler(clock: Arc<Mutex<f64>>) -> PlaybackScheduler {
        let sink = FakeSink {
            clock,
            plays: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        };
        PlaybackScheduler::new(Box::new(sink), pcm::OUTPUT_SAMPLE_RATE)
    }

    impl OutputSink for FakeSink {
        fn now(&self) -> f64 {
            *self.clock.lock().unwrap()
        }

        fn play(
            &mut self,
            _samples: &[f32],
            _sample_rate: u32,
            start_time: f64,
            handle: ChunkHandle,
        ) -> Result<()> {
            if self.fail {
                bail!("sink failure");
            }
            self.plays.lock().unwrap().push((handle, start_time));
            Ok(())
        }
    }

    fn chunk_of(duration_secs: f64) -> Vec<f32> {
        vec![0.1; (duration_secs * pcm::OUTPUT_SAMPLE_RATE as f64) as usize]
    }

    #[test]
    fn test_back_to_back_chunks_get_sequential_spans() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut scheduler = fake_scheduler(clock);

        // Three chunks arriving with no gap: 0.5s, 0.3s, 0.4s
        let a = scheduler.schedule(&chunk_of(0.5)).unwrap();
        let b = scheduler.schedule(&chunk_of(0.3)).unwrap();
        let c = scheduler.schedule(&chunk_of(0.4)).unwrap();

        assert!((a.start_time - 0.0).abs() < 1e-6);
        assert!((a.duration - 0.5).abs() < 1e-6);
        assert!((b.start_time - 0.5).abs() < 1e-6);
        assert!((b.duration - 0.3).abs() < 1e-6);
        assert!((c.start_time - 0.8).abs() < 1e-6);
        assert!((c.duration - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_start_never_earlier_than_device_time() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut scheduler = fake_scheduler(Arc::clone(&clock));

        let a = scheduler.schedule(&chunk_of(0.1)).unwrap();
        assert!((a.start_time - 0.0).abs() < 1e-6);

        // Device clock has run past the end of the last chunk
        *clock.lock().unwrap() = 5.0;
        let b = scheduler.schedule(&chunk_of(0.1)).unwrap();
        assert!((b.start_time - 5.0).abs() < 1e-6);

        // And the clock stays monotonic from there
        let c = scheduler.schedule(&chunk_of(0.1)).unwrap();
        assert!((c.start_time - 5.1).abs() < 1e-6);
    }

    #[test]
    fn test_speaking_tracks_active_set() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut scheduler = fake_scheduler(clock);

        assert!(!scheduler.is_speaking());

        let a = scheduler.schedule(&chunk_of(0.2)).unwrap();
        let b = scheduler.schedule(&chunk_of(0.2)).unwrap();
        assert!(scheduler.is_speaking());
        assert_eq!(scheduler.active_count(), 2);

        scheduler.on_chunk_finished(a.handle);
        assert!(scheduler.is_speaking());

        scheduler.on_chunk_finished(b.handle);
        assert!(!scheduler.is_speaking());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_finishing_unknown_handle_is_harmless() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut scheduler = fake_scheduler(clock);

        scheduler.on_chunk_finished(ChunkHandle(42));
        assert!(!scheduler.is_speaking());
    }

    #[test]
    fn test_sink_failure_does_not_advance_clock() {
        let clock = Arc::new(Mutex::new(0.0));
        let sink = FakeSink {
            clock: Arc::clone(&clock),
            plays: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut scheduler = PlaybackScheduler::new(Box::new(sink), pcm::OUTPUT_SAMPLE_RATE);

        assert!(scheduler.schedule(&chunk_of(0.5)).is_err());
        assert!(!scheduler.is_speaking());
        assert!((scheduler.next_start_time - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_handles_are_unique() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut scheduler = fake_scheduler(clock);

        let a = scheduler.schedule(&chunk_of(0.1)).unwrap();
        let b = scheduler.schedule(&chunk_of(0.1)).unwrap();
        assert_ne!(a.handle, b.handle);
    }
}
