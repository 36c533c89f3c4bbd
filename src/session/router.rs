use std::sync::Arc;
use tracing::warn;

use crate::audio::{pcm, ChunkHandle, CueService, PlaybackScheduler, Scheduled};
use crate::live::ServerContent;

/// Routes inbound server content to the transcript, the playback scheduler,
/// and the one-shot cue triggers.
///
/// The routing rules are applied independently; one message may carry
/// transcript text, a turn boundary, and reply audio all at once. The two cue
/// flags are one-shots per turn, reset when a turn-complete signal arrives.
pub struct EventRouter {
    scheduler: PlaybackScheduler,
    cues: Arc<dyn CueService>,

    /// Running transcript of the coach's speech. Append-only; deliberately
    /// never reset on turn completion, it is the session log.
    transcript: String,

    listening_cue_played: bool,
    reply_cue_played: bool,

    chunks_scheduled: usize,
}

impl EventRouter {
    pub fn new(scheduler: PlaybackScheduler, cues: Arc<dyn CueService>) -> Self {
        Self {
            scheduler,
            cues,
            transcript: String::new(),
            listening_cue_played: false,
            reply_cue_played: false,
            chunks_scheduled: 0,
        }
    }

    /// Apply the routing rules to one server message. Returns the schedule
    /// descriptor when reply audio was queued, so the caller can arm the
    /// completion timer.
    pub fn handle_content(&mut self, content: &ServerContent) -> Option<Scheduled> {
        if let Some(output) = &content.output_transcription {
            self.transcript.push(' ');
            self.transcript.push_str(&output.text);
        }

        if content.input_transcription.is_some() && !self.listening_cue_played {
            self.cues.play_listening_start();
            self.cues.trigger_haptic(&[10]);
            self.listening_cue_played = true;
        }

        if content.turn_complete {
            self.listening_cue_played = false;
            self.reply_cue_played = false;
        }

        let mut scheduled = None;
        if let Some(audio) = content.inline_audio() {
            if !self.reply_cue_played {
                self.cues.play_reply_chime();
                self.reply_cue_played = true;
            }

            match pcm::decode_chunk(&audio.data) {
                Ok(samples) => match self.scheduler.schedule(&samples) {
                    Ok(s) => {
                        self.chunks_scheduled += 1;
                        scheduled = Some(s);
                    }
                    Err(e) => warn!("Failed to schedule reply chunk: {}", e),
                },
                // Malformed chunk: skip it, leave the playback clock alone
                Err(e) => warn!("Failed to decode reply chunk: {}", e),
            }
        }

        scheduled
    }

    /// Completion callback for a scheduled chunk
    pub fn on_chunk_finished(&mut self, handle: ChunkHandle) {
        self.scheduler.on_chunk_finished(handle);
    }

    pub fn is_speaking(&self) -> bool {
        self.scheduler.is_speaking()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn chunks_scheduled(&self) -> usize {
        self.chunks_scheduled
    }

    /// Current time on the output sink clock
    pub fn sink_now(&self) -> f64 {
        self.scheduler.sink_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{NullSink, OutputSink};
    use crate::live::messages::{Content, InlineData, Part, ServerContent, Transcription};
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingCues {
        listening: AtomicUsize,
        chime: AtomicUsize,
        haptics: Mutex<Vec<Vec<u64>>>,
    }

    impl CueService for CountingCues {
        fn play_listening_start(&self) {
            self.listening.fetch_add(1, Ordering::SeqCst);
        }
        fn play_reply_chime(&self) {
            self.chime.fetch_add(1, Ordering::SeqCst);
        }
        fn trigger_haptic(&self, pattern_ms: &[u64]) {
            self.haptics.lock().unwrap().push(pattern_ms.to_vec());
        }
    }

    /// Sink with a clock frozen at zero so schedule times are deterministic
    struct FrozenSink;

    impl OutputSink for FrozenSink {
        fn now(&self) -> f64 {
            0.0
        }
        fn play(
            &mut self,
            _samples: &[f32],
            _sample_rate: u32,
            _start_time: f64,
            _handle: ChunkHandle,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn router_with_cues() -> (EventRouter, Arc<CountingCues>) {
        let cues = Arc::new(CountingCues::default());
        let scheduler = PlaybackScheduler::new(Box::new(FrozenSink), pcm::OUTPUT_SAMPLE_RATE);
        (EventRouter::new(scheduler, cues.clone()), cues)
    }

    fn output_text(text: &str) -> ServerContent {
        ServerContent {
            output_transcription: Some(Transcription {
                text: text.to_string(),
            }),
            ..Default::default()
        }
    }

    fn input_text() -> ServerContent {
        ServerContent {
            input_transcription: Some(Transcription {
                text: "user speech".to_string(),
            }),
            ..Default::default()
        }
    }

    fn turn_complete() -> ServerContent {
        ServerContent {
            turn_complete: true,
            ..Default::default()
        }
    }

    fn audio_content(samples: &[f32]) -> ServerContent {
        ServerContent {
            model_turn: Some(Content {
                parts: vec![Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: pcm::encode_frame(samples),
                    }),
                }],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_transcript_accumulates_with_separating_spaces() {
        let (mut router, _) = router_with_cues();

        router.handle_content(&output_text("Breathe"));
        router.handle_content(&output_text("and flow."));

        assert_eq!(router.transcript(), " Breathe and flow.");
    }

    #[test]
    fn test_transcript_survives_turn_completion() {
        let (mut router, _) = router_with_cues();

        router.handle_content(&output_text("First turn."));
        router.handle_content(&turn_complete());
        router.handle_content(&output_text("Second turn."));

        assert_eq!(router.transcript(), " First turn. Second turn.");
    }

    #[test]
    fn test_listening_cue_fires_once_per_turn() {
        let (mut router, cues) = router_with_cues();

        router.handle_content(&input_text());
        router.handle_content(&input_text());
        router.handle_content(&input_text());
        assert_eq!(cues.listening.load(Ordering::SeqCst), 1);

        router.handle_content(&turn_complete());
        router.handle_content(&input_text());
        assert_eq!(cues.listening.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reply_cue_fires_once_per_turn() {
        let (mut router, cues) = router_with_cues();
        let samples = vec![0.1f32; 2400];

        router.handle_content(&audio_content(&samples));
        router.handle_content(&audio_content(&samples));
        assert_eq!(cues.chime.load(Ordering::SeqCst), 1);

        router.handle_content(&turn_complete());
        router.handle_content(&audio_content(&samples));
        assert_eq!(cues.chime.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listening_cue_triggers_haptic() {
        let (mut router, cues) = router_with_cues();

        router.handle_content(&input_text());
        assert_eq!(cues.haptics.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_audio_chunks_get_sequential_spans() {
        let (mut router, _) = router_with_cues();

        // 0.5s, 0.3s, 0.4s at 24kHz
        let a = router
            .handle_content(&audio_content(&vec![0.1f32; 12000]))
            .unwrap();
        let b = router
            .handle_content(&audio_content(&vec![0.1f32; 7200]))
            .unwrap();
        let c = router
            .handle_content(&audio_content(&vec![0.1f32; 9600]))
            .unwrap();

        assert!((a.start_time - 0.0).abs() < 1e-6);
        assert!((b.start_time - 0.5).abs() < 1e-6);
        assert!((c.start_time - 0.8).abs() < 1e-6);
        assert!((c.duration - 0.4).abs() < 1e-6);

        assert!(router.is_speaking());
        assert_eq!(router.chunks_scheduled(), 3);

        router.on_chunk_finished(a.handle);
        router.on_chunk_finished(b.handle);
        router.on_chunk_finished(c.handle);
        assert!(!router.is_speaking());
    }

    #[test]
    fn test_malformed_audio_is_skipped_without_clock_advance() {
        let (mut router, _) = router_with_cues();

        let bad = ServerContent {
            model_turn: Some(Content {
                parts: vec![Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: "!!not base64!!".to_string(),
                    }),
                }],
            }),
            ..Default::default()
        };

        assert!(router.handle_content(&bad).is_none());
        assert!(!router.is_speaking());
        assert_eq!(router.chunks_scheduled(), 0);

        // Next good chunk still starts at the front of the timeline
        let good = router
            .handle_content(&audio_content(&vec![0.1f32; 2400]))
            .unwrap();
        assert!((good.start_time - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_combined_message_matches_multiple_rules() {
        let (mut router, cues) = router_with_cues();

        let combined = ServerContent {
            output_transcription: Some(Transcription {
                text: "wisdom".to_string(),
            }),
            model_turn: Some(Content {
                parts: vec![Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: pcm::encode_frame(&vec![0.1f32; 2400]),
                    }),
                }],
            }),
            ..Default::default()
        };

        let scheduled = router.handle_content(&combined);
        assert!(scheduled.is_some());
        assert_eq!(router.transcript(), " wisdom");
        assert_eq!(cues.chime.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_sink_router_construction() {
        let cues: Arc<dyn CueService> = Arc::new(CountingCues::default());
        let scheduler = PlaybackScheduler::new(Box::new(NullSink::new()), pcm::OUTPUT_SAMPLE_RATE);
        let router = EventRouter::new(scheduler, cues);
        assert!(!router.is_speaking());
        assert_eq!(router.transcript(), "");
    }
}
