use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::CaptureInput;
use crate::live::LiveConfig;

/// Where scheduled reply audio goes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    /// Track the playback timeline without rendering audio
    Null,
    /// Render the playback timeline to a WAV file
    WavFile(PathBuf),
}

/// Configuration for one live coaching session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "live-<uuid>")
    pub session_id: String,

    /// Realtime WebSocket endpoint URL
    pub endpoint: String,

    /// Model identifier requested at setup
    pub model: String,

    /// Prebuilt voice for synthesized replies
    pub voice: String,

    /// System prompt establishing the coach persona
    pub system_prompt: String,

    /// API key for the realtime endpoint
    pub api_key: String,

    /// Where microphone audio comes from
    pub capture: CaptureInput,

    /// Where scheduled reply audio goes
    pub output: OutputTarget,
}

impl SessionConfig {
    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            voice: self.voice.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("live-{}", uuid::Uuid::new_v4()),
            endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            model: "models/gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
            voice: "Zephyr".to_string(),
            system_prompt: "You are Zephyr, a coach from Verblis Health. Speak with warmth and encourage the user to breathe, flow, and thrive.".to_string(),
            api_key: String::new(),
            capture: CaptureInput::Microphone,
            output: OutputTarget::Null,
        }
    }
}
