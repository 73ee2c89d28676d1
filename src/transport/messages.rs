use serde::{Deserialize, Serialize};

use crate::dialogue::QuestionInjection;
use crate::session::Speaker;

/// Lifecycle labels carried by `status` messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Connected,
    GeneratingQuestions,
    QuestionsReady,
    Error,
}

/// Server → client envelope, serialized as `{"type": ..., ...payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status {
        status: StatusLabel,
    },
    Transcript {
        speaker: Speaker,
        text: String,
    },
    /// Scripted mode only
    Question {
        text: String,
        index: usize,
        total: usize,
    },
    Audio {
        /// Base64-encoded WAV
        audio: String,
        sequence: usize,
    },
    /// Terminal; nothing follows
    Finished,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn status(status: StatusLabel) -> Self {
        ServerMessage::Status { status }
    }

    pub fn transcript(speaker: Speaker, text: impl Into<String>) -> Self {
        ServerMessage::Transcript {
            speaker,
            text: text.into(),
        }
    }

    pub fn audio(bytes: &[u8], sequence: usize) -> Self {
        use base64::Engine;
        ServerMessage::Audio {
            audio: base64::engine::general_purpose::STANDARD.encode(bytes),
            sequence,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Status { .. } => "status",
            ServerMessage::Transcript { .. } => "transcript",
            ServerMessage::Question { .. } => "question",
            ServerMessage::Audio { .. } => "audio",
            ServerMessage::Finished => "finished",
            ServerMessage::Error { .. } => "error",
        }
    }
}

impl From<QuestionInjection> for ServerMessage {
    fn from(q: QuestionInjection) -> Self {
        ServerMessage::Question {
            text: q.text,
            index: q.index,
            total: q.total,
        }
    }
}

/// Client → server control message (text frames; audio travels as binary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The user started speaking over the agent
    Interrupt,
    /// The client wants the session to end
    Stop,
}
