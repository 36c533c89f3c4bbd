use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

/// Snapshot of a session for the control API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,

    pub state: SessionState,

    /// start() has been called and not torn down
    pub started: bool,

    /// The remote endpoint confirmed setup
    pub connected: bool,

    /// At least one scheduled reply chunk has not finished playing
    pub speaking: bool,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Seconds since creation
    pub duration_secs: f64,

    /// Microphone frames handed to the outbound channel
    pub frames_sent: usize,

    /// Reply chunks scheduled for playback
    pub chunks_scheduled: usize,

    /// Length of the running transcript
    pub transcript_chars: usize,
}
