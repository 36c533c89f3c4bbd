//! Realtime session transport
//!
//! This module speaks the bidirectional streaming protocol of the remote
//! conversational endpoint:
//! - Outbound: one setup message, then base64 PCM16 microphone frames
//! - Inbound: transcript text, reply audio chunks, turn boundaries, and
//!   lifecycle signals

pub mod client;
pub mod messages;

pub use client::{LiveClient, LiveConfig, LiveEvent};
pub use messages::{InlineData, ServerContent, ServerMessage, SetupMessage};
