//! Narrow adapter interfaces for the external speech and language providers.
//!
//! The orchestration core only sees these traits; vendor payloads stay inside
//! the concrete adapters.

pub mod openai;

use serde::{Deserialize, Serialize};

use crate::audio::AudioChunk;
use crate::error::Result;

pub use openai::{OpenAiChat, OpenAiSpeech, OpenAiTranscriber};

/// Speech-to-text provider
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Convert one utterance to text. `encoding` is a MIME type such as `audio/wav`.
    async fn transcribe(&self, audio: Vec<u8>, encoding: &str) -> Result<String>;
}

/// Chat role of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Language-generation provider, treated as an opaque turn oracle
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Text-to-speech provider
///
/// Providers may return one buffer or a sequence of chunks; either way the
/// chunks are in playback order.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioChunk>>;
}
