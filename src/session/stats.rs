use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::InterviewParams;
use crate::dialogue::DialogueMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// A single entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,

    pub text: String,

    /// When this turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Record persisted when a session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,

    pub params: InterviewParams,

    pub mode: DialogueMode,

    pub started_at: DateTime<Utc>,

    pub ended_at: DateTime<Utc>,

    /// Full conversation in chronological order
    pub turns: Vec<Turn>,

    /// Number of interview questions the agent asked
    pub questions_asked: usize,

    /// Whether the interview reached its closing message
    pub completed: bool,
}

impl SessionSummary {
    pub fn duration_secs(&self) -> f64 {
        self.ended_at
            .signed_duration_since(self.started_at)
            .num_milliseconds() as f64
            / 1000.0
    }
}

/// Live view of an active session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub params: InterviewParams,
    pub mode: DialogueMode,
    pub started_at: DateTime<Utc>,
}
