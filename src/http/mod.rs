//! HTTP API server
//!
//! This module provides the interview endpoints:
//! - GET /interview/ws - Start an interview over a WebSocket
//! - GET /sessions - List live sessions
//! - POST /sessions/:id/stop - Finish a live session
//! - GET /activities/:id - Fetch a finished session's summary
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
