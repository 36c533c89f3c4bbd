//! HTTP API server for external control (mobile-web client)
//!
//! This module provides a REST API for controlling the live voice session:
//! - POST /session/start - Start the live session
//! - POST /session/stop - Stop the live session
//! - GET /session/status - Query lifecycle state (started/connected/speaking)
//! - GET /session/transcript - Get the running transcript
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
