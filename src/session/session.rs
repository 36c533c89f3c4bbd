use super::config::{OutputTarget, SessionConfig};
use super::router::EventRouter;
use super::status::{SessionState, SessionStatus};
use crate::audio::{pcm, CaptureSource, CaptureSourceFactory, CueService, NullSink, OutputSink, PlaybackScheduler, WavSink};
use crate::live::{LiveClient, LiveEvent};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One live voice session: owns the connection lifecycle, the capture
/// pipeline, and the inbound event loop.
///
/// At most one of these should exist at a time; the HTTP layer enforces that.
pub struct LiveSession {
    /// Session configuration
    config: SessionConfig,

    /// Lifecycle state (idle -> connecting -> active -> closed)
    state: Arc<Mutex<SessionState>>,

    /// When the session was created
    started_at: chrono::DateTime<chrono::Utc>,

    /// Gates the capture pipeline; cleared on close or remote close
    is_running: Arc<AtomicBool>,

    /// Microphone frames handed to the outbound channel
    frames_sent: Arc<AtomicUsize>,

    /// Demultiplexer state: transcript, turn flags, playback scheduler
    router: Arc<Mutex<EventRouter>>,

    /// Live connection handle, present while started
    client: Arc<Mutex<Option<LiveClient>>>,

    /// Capture source, present while started
    capture: Arc<Mutex<Option<Box<dyn CaptureSource>>>>,

    /// Handle for the capture/encode/send task
    capture_task: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Handle for the inbound event loop
    event_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LiveSession {
    /// Create a session in the idle state. The cue service is injected by
    /// the composition root and shared across sessions.
    pub fn new(config: SessionConfig, cues: Arc<dyn CueService>) -> Result<Self> {
        info!("Creating live session: {}", config.session_id);

        let sink: Box<dyn OutputSink> = match &config.output {
            OutputTarget::Null => Box::new(NullSink::new()),
            OutputTarget::WavFile(path) => Box::new(
                WavSink::create(path, pcm::OUTPUT_SAMPLE_RATE)
                    .context("Failed to create WAV output sink")?,
            ),
        };

        let scheduler = PlaybackScheduler::new(sink, pcm::OUTPUT_SAMPLE_RATE);
        let router = EventRouter::new(scheduler, cues);

        Ok(Self {
            config,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            started_at: Utc::now(),
            is_running: Arc::new(AtomicBool::new(false)),
            frames_sent: Arc::new(AtomicUsize::new(0)),
            router: Arc::new(Mutex::new(router)),
            client: Arc::new(Mutex::new(None)),
            capture: Arc::new(Mutex::new(None)),
            capture_task: Arc::new(Mutex::new(None)),
            event_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Start the session: open capture, connect the live endpoint, and spawn
    /// the streaming tasks. Any setup failure reverts the state to idle and
    /// retains no handles; there is no automatic retry.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if *state != SessionState::Idle {
                warn!("Session already started");
                return Ok(());
            }
            *state = SessionState::Connecting;
        }

        info!("Starting live session: {}", self.config.session_id);

        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to start session: {}", e);
                self.is_running.store(false, Ordering::SeqCst);
                if let Some(client) = self.client.lock().await.take() {
                    client.close().await;
                }
                if let Some(mut capture) = self.capture.lock().await.take() {
                    let _ = capture.stop().await;
                }
                *self.state.lock().await = SessionState::Idle;
                Err(e)
            }
        }
    }

    async fn try_start(&self) -> Result<()> {
        let mut capture = CaptureSourceFactory::create(self.config.capture.clone())
            .context("Failed to create capture source")?;

        let mut blocks_rx = capture
            .start()
            .await
            .context("Failed to start audio capture")?;

        let (client, mut events_rx) = LiveClient::connect(&self.config.live_config())
            .await
            .context("Failed to open realtime session")?;

        self.is_running.store(true, Ordering::SeqCst);

        // Capture pipeline: encode each block and hand it to the outbound
        // channel. Sends never block; a dropped frame does not stop capture.
        let capture_client = client.clone();
        let frames_sent = Arc::clone(&self.frames_sent);
        let is_running = Arc::clone(&self.is_running);
        let mime_type = pcm::input_mime_type();

        let capture_task = tokio::spawn(async move {
            info!("Capture pipeline started");

            while let Some(block) = blocks_rx.recv().await {
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }

                let data = pcm::encode_frame(&block);
                if capture_client.send_audio_frame(data, mime_type.clone()) {
                    frames_sent.fetch_add(1, Ordering::SeqCst);
                } else {
                    debug!("Dropped outbound audio frame");
                }
            }

            info!("Capture pipeline stopped");
        });

        // Inbound event loop: demultiplex server events and retire finished
        // playback chunks.
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let router = Arc::clone(&self.router);
        let state = Arc::clone(&self.state);
        let is_running = Arc::clone(&self.is_running);

        let event_task = tokio::spawn(async move {
            info!("Event loop started");

            loop {
                tokio::select! {
                    event = events_rx.recv() => match event {
                        Some(LiveEvent::Open) => {
                            let mut state = state.lock().await;
                            if *state == SessionState::Connecting {
                                *state = SessionState::Active;
                                info!("Live session active");
                            }
                        }
                        Some(LiveEvent::Message(msg)) => {
                            let Some(content) = &msg.server_content else { continue };
                            let mut router = router.lock().await;
                            if let Some(scheduled) = router.handle_content(content) {
                                // Arm the completion timer for this chunk
                                let delay = (scheduled.start_time + scheduled.duration
                                    - router.sink_now())
                                    .max(0.0);
                                let done_tx = done_tx.clone();
                                tokio::spawn(async move {
                                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                                    let _ = done_tx.send(scheduled.handle);
                                });
                            }
                        }
                        Some(LiveEvent::Error(e)) => {
                            // No state change, no automatic recovery
                            error!("Live session error: {}", e);
                        }
                        Some(LiveEvent::Closed) | None => {
                            is_running.store(false, Ordering::SeqCst);
                            *state.lock().await = SessionState::Closed;
                            info!("Live session closed by remote");
                            break;
                        }
                    },
                    Some(handle) = done_rx.recv() => {
                        router.lock().await.on_chunk_finished(handle);
                    }
                }
            }
        });

        *self.client.lock().await = Some(client);
        *self.capture.lock().await = Some(capture);
        *self.capture_task.lock().await = Some(capture_task);
        *self.event_task.lock().await = Some(event_task);

        Ok(())
    }

    /// Tear the session down. Safe to call from any state, including a
    /// session that was never started or only partially initialized.
    pub async fn close(&self) -> SessionStatus {
        info!("Closing live session: {}", self.config.session_id);

        self.is_running.store(false, Ordering::SeqCst);

        if let Some(client) = self.client.lock().await.take() {
            client.close().await;
        }

        if let Some(mut capture) = self.capture.lock().await.take() {
            if let Err(e) = capture.stop().await {
                error!("Failed to stop capture source: {}", e);
            }
        }

        if let Some(task) = self.capture_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Capture task panicked: {}", e);
            }
        }

        // The event loop normally exits on the remote close; abort covers a
        // remote that never answers the close handshake.
        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }

        *self.state.lock().await = SessionState::Closed;

        info!("Live session closed: {}", self.config.session_id);
        self.status().await
    }

    /// Snapshot of the session for the control API
    pub async fn status(&self) -> SessionStatus {
        let state = *self.state.lock().await;
        let router = self.router.lock().await;
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStatus {
            session_id: self.config.session_id.clone(),
            state,
            started: state != SessionState::Idle,
            connected: state == SessionState::Active,
            speaking: router.is_speaking(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            chunks_scheduled: router.chunks_scheduled(),
            transcript_chars: router.transcript().len(),
        }
    }

    /// The running transcript of the coach's speech
    pub async fn transcript(&self) -> String {
        self.router.lock().await.transcript().to_string()
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }
}
