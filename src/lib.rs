pub mod audio;
pub mod config;
pub mod http;
pub mod live;
pub mod session;

pub use audio::{
    CaptureBlock, CaptureInput, CaptureSource, CaptureSourceFactory, ChunkHandle, CueService,
    NullSink, OutputSink, PlaybackScheduler, Scheduled, SynthCueService, WavCaptureSource, WavSink,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use live::{LiveClient, LiveConfig, LiveEvent};
pub use session::{EventRouter, LiveSession, OutputTarget, SessionConfig, SessionState, SessionStatus};
