use crate::audio::CueService;
use crate::config::Config;
use crate::session::LiveSession;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one live session, if any (at most one exists at a time)
    pub session: Arc<RwLock<Option<Arc<LiveSession>>>>,

    /// Loaded service configuration (session defaults)
    pub config: Arc<Config>,

    /// Cue service shared by every session, injected at composition
    pub cues: Arc<dyn CueService>,
}

impl AppState {
    pub fn new(config: Config, cues: Arc<dyn CueService>) -> Self {
        Self {
            session: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            cues,
        }
    }
}
