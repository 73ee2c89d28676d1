//! OpenAI-compatible HTTP adapters (OpenAI, OpenRouter, local gateways).

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, LanguageModel, Synthesizer, Transcriber};
use crate::audio::{wrap_pcm16, AudioChunk};
use crate::config::ProviderConfig;
use crate::error::{InterviewError, ProviderKind, Result};

fn build_client(timeout_secs: u64, kind: ProviderKind) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| InterviewError::provider(kind, e.to_string()))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

async fn check_status(res: reqwest::Response, kind: ProviderKind) -> Result<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(InterviewError::provider(
        kind,
        format!("API error {}: {}", status, body),
    ))
}

/// `POST /audio/transcriptions`
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiTranscriber {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.stt_model.clone(),
            client: build_client(config.timeout_secs, ProviderKind::Transcription)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[async_trait::async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, encoding: &str) -> Result<String> {
        let kind = ProviderKind::Transcription;
        if audio.is_empty() {
            return Ok(String::new());
        }

        let extension = encoding.rsplit('/').next().unwrap_or("wav");
        let part = Part::bytes(audio)
            .file_name(format!("utterance.{}", extension))
            .mime_str(encoding)
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let res = self
            .client
            .post(endpoint(&self.base_url, "audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;

        let body: TranscriptionResponse = check_status(res, kind)
            .await?
            .json()
            .await
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;

        Ok(body.text.trim().to_string())
    }
}

/// `POST /chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.llm_model.clone(),
            client: build_client(config.timeout_secs, ProviderKind::Generation)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiChat {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let kind = ProviderKind::Generation;
        let payload = json!({
            "model": self.model,
            "messages": messages,
        });

        let res = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;

        let body: ChatResponse = check_status(res, kind)
            .await?
            .json()
            .await
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;

        // Missing content is passed through as empty; the policy decides
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!("Generated {} chars", text.len());
        Ok(text)
    }
}

/// Sample rate of `pcm` speech output (mono, signed 16-bit little-endian)
const SPEECH_PCM_RATE: u32 = 24_000;

/// Turn a raw `pcm` speech response into a playable chunk
///
/// Raw PCM is requested because streamed WAV output carries placeholder
/// lengths in its header.
fn speech_chunk(pcm: &[u8]) -> Result<AudioChunk> {
    let kind = ProviderKind::Synthesis;
    if pcm.len() < 2 {
        return Err(InterviewError::provider(kind, "empty audio response"));
    }
    let bytes =
        wrap_pcm16(pcm, SPEECH_PCM_RATE).map_err(|e| InterviewError::provider(kind, e.to_string()))?;
    Ok(AudioChunk {
        bytes,
        sequence_hint: 0,
    })
}

/// `POST /audio/speech`, requesting raw PCM output
#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            client: build_client(config.timeout_secs, ProviderKind::Synthesis)?,
        })
    }
}

#[async_trait::async_trait]
impl Synthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioChunk>> {
        let kind = ProviderKind::Synthesis;
        let payload = json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "pcm",
        });

        let res = self
            .client
            .post(endpoint(&self.base_url, "audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;

        let bytes = check_status(res, kind)
            .await?
            .bytes()
            .await
            .map_err(|e| InterviewError::provider(kind, e.to_string()))?;

        debug!("Synthesized {} bytes of PCM", bytes.len());
        Ok(vec![speech_chunk(&bytes)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("https://api.example.com/v1/", "chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_speech_chunk_wraps_pcm_at_provider_rate() {
        // Half a second of 24 kHz audio
        let pcm = vec![0u8; 24_000];
        let chunk = speech_chunk(&pcm).unwrap();
        let decoded = crate::audio::decode_wav(&chunk.bytes).unwrap();
        assert_eq!(decoded.sample_rate, 24_000);
        assert!((decoded.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_speech_chunk_rejects_empty_body() {
        assert!(matches!(
            speech_chunk(&[]),
            Err(InterviewError::Provider {
                kind: ProviderKind::Synthesis,
                ..
            })
        ));
    }

    #[test]
    fn test_chat_response_tolerates_null_content() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());
    }
}
