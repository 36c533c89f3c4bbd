pub mod capture;
pub mod cue;
pub mod pcm;
pub mod playback;

pub use capture::{CaptureBlock, CaptureInput, CaptureSource, CaptureSourceFactory, WavCaptureSource};
pub use cue::{CuePlayback, CueService, SynthCueService, ToneSpec};
pub use playback::{ChunkHandle, NullSink, OutputSink, PlaybackScheduler, Scheduled, WavSink};
