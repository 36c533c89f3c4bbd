//! Live session management
//!
//! This module provides the `LiveSession` abstraction that manages:
//! - The realtime connection lifecycle (idle -> connecting -> active -> closed)
//! - Microphone capture, PCM16 encoding, and outbound streaming
//! - Demultiplexing of inbound transcript, audio, and turn-boundary events
//! - Gapless playback scheduling of streamed reply audio
//! - One-shot listening/reply cues per conversational turn

mod config;
mod router;
mod session;
mod status;

pub use config::{OutputTarget, SessionConfig};
pub use router::EventRouter;
pub use session::LiveSession;
pub use status::{SessionState, SessionStatus};
