//! Interview session management
//!
//! This module provides the per-session orchestration:
//! - `SessionController`: phase state machine, history and completion
//! - `SessionRunner`: async pipeline wiring capture, VAD, providers and playback
//! - `SessionManager`: explicit registry of live sessions
//! - Session parameters, turns and persisted summaries

mod controller;
mod manager;
mod params;
mod phase;
mod runner;
mod stats;

pub use controller::SessionController;
pub use manager::{SessionHandle, SessionManager};
pub use params::{InterviewParams, StartRequest};
pub use phase::Phase;
pub use runner::{DialoguePlan, RunnerConfig, SessionRunner, SessionServices};
pub use stats::{SessionStatus, SessionSummary, Speaker, Turn};
