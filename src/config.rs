use anyhow::Result;
use serde::Deserialize;

use crate::audio::VadConfig;
use crate::dialogue::DialogueMode;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub dialogue: DialogueConfig,
    pub providers: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-interviewer".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture encoding negotiated with clients: 16-bit LE PCM at this rate
    pub sample_rate: u32,
    pub channels: u16,
    /// Capacity of the inbound frame queue; frames beyond it are dropped
    pub frame_queue: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Whisper expects 16kHz
            channels: 1,
            frame_queue: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub mode: DialogueMode,
    /// Number of pre-generated questions in scripted mode
    pub question_count: usize,
    /// Question/answer exchanges before free-form mode forces the close
    pub max_turns: usize,
    pub terminal_phrase: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            mode: DialogueMode::Scripted,
            question_count: 5,
            max_turns: 6,
            terminal_phrase: "That concludes our interview".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible API root, without trailing slash
    pub base_url: String,
    pub api_key: String,
    pub stt_model: String,
    pub llm_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    /// Upper bound for any single provider call
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            stt_model: "whisper-1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load from an optional file, overlaid with `INTERVIEWER__SECTION__KEY` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("INTERVIEWER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
