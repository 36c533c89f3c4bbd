// One-shot audio and haptic cues played at conversation transition points

use tokio::sync::mpsc;
use tracing::debug;

use super::pcm::OUTPUT_SAMPLE_RATE;

/// Fire-and-forget cue playback. Implementations never fail the caller;
/// delivery problems are swallowed.
pub trait CueService: Send + Sync {
    /// Short descending tone confirming the coach heard the user start speaking
    fn play_listening_start(&self);

    /// Rising chime announcing the start of a spoken reply
    fn play_reply_chime(&self);

    /// Device vibration pattern in milliseconds; no-op where unsupported
    fn trigger_haptic(&self, pattern_ms: &[u64]);
}

/// Parameters for a synthesized sine sweep: exponential frequency ramp over
/// `ramp_secs`, holding at `end_hz` while the gain decays over the full
/// duration. No external asset dependency.
#[derive(Debug, Clone, Copy)]
pub struct ToneSpec {
    pub start_hz: f32,
    pub end_hz: f32,
    /// Frequency sweep time; the tone holds at `end_hz` afterwards
    pub ramp_secs: f32,
    pub gain: f32,
    pub duration_secs: f32,
}

/// 220Hz falling to 110Hz over the first 0.2s, decaying out at 0.4s
pub const LISTENING_START: ToneSpec = ToneSpec {
    start_hz: 220.0,
    end_hz: 110.0,
    ramp_secs: 0.2,
    gain: 0.06,
    duration_secs: 0.4,
};

/// 880Hz rising to 1320Hz over the first 0.15s, decaying out at 0.6s
pub const REPLY_CHIME: ToneSpec = ToneSpec {
    start_hz: 880.0,
    end_hz: 1320.0,
    ramp_secs: 0.15,
    gain: 0.04,
    duration_secs: 0.6,
};

impl ToneSpec {
    /// Render the sweep as mono float samples at the given rate
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let total = (self.duration_secs * sample_rate as f32) as usize;
        let mut samples = Vec::with_capacity(total);
        let mut phase = 0.0f32;

        for i in 0..total {
            let t = i as f32 / sample_rate as f32;
            let freq = if t < self.ramp_secs {
                self.start_hz * (self.end_hz / self.start_hz).powf(t / self.ramp_secs)
            } else {
                self.end_hz
            };
            let amp = self.gain * (0.001 / self.gain).powf(t / self.duration_secs);

            phase += std::f32::consts::TAU * freq / sample_rate as f32;
            samples.push(amp * phase.sin());
        }

        samples
    }
}

/// A rendered cue ready for playback
#[derive(Debug, Clone)]
pub struct CuePlayback {
    pub name: &'static str,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Synthesizes the cue tones and hands them to an optional consumer channel.
/// Without a consumer the cue is logged and dropped.
pub struct SynthCueService {
    tx: Option<mpsc::UnboundedSender<CuePlayback>>,
}

impl SynthCueService {
    pub fn new() -> Self {
        Self { tx: None }
    }

    /// Deliver rendered cues to `tx` (e.g. a playback device task)
    pub fn with_consumer(tx: mpsc::UnboundedSender<CuePlayback>) -> Self {
        Self { tx: Some(tx) }
    }

    fn emit(&self, name: &'static str, spec: ToneSpec) {
        debug!("Cue: {}", name);
        if let Some(tx) = &self.tx {
            let _ = tx.send(CuePlayback {
                name,
                samples: spec.render(OUTPUT_SAMPLE_RATE),
                sample_rate: OUTPUT_SAMPLE_RATE,
            });
        }
    }
}

impl Default for SynthCueService {
    fn default() -> Self {
        Self::new()
    }
}

impl CueService for SynthCueService {
    fn play_listening_start(&self) {
        self.emit("listening-start", LISTENING_START);
    }

    fn play_reply_chime(&self) {
        self.emit("reply-chime", REPLY_CHIME);
    }

    fn trigger_haptic(&self, pattern_ms: &[u64]) {
        // No vibration hardware on the service host; kept for parity with
        // device-backed implementations
        debug!("Haptic: {:?}", pattern_ms);
    }
}
