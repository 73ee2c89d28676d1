//! Error types for the interview orchestrator

use crate::session::Phase;
use std::fmt;
use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, InterviewError>;

/// Which external provider a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Transcription,
    Generation,
    Synthesis,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Transcription => "transcription",
            ProviderKind::Generation => "generation",
            ProviderKind::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while running an interview session
#[derive(Error, Debug)]
pub enum InterviewError {
    /// Session-start parameters were missing or malformed; no session exists
    #[error("Invalid session parameters: {0}")]
    Validation(String),

    #[error("{kind} provider error: {message}")]
    Provider { kind: ProviderKind, message: String },

    /// The streaming channel went away mid-session
    #[error("Transport error: {0}")]
    Transport(String),

    /// VAD false positive, never shown to the user
    #[error("Utterance too short ({voiced_ms}ms), discarded")]
    EmptyUtterance { voiced_ms: u64 },

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },
}

impl InterviewError {
    pub fn provider(kind: ProviderKind, message: impl Into<String>) -> Self {
        InterviewError::Provider {
            kind,
            message: message.into(),
        }
    }
}
