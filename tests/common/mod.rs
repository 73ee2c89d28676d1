// Shared test doubles for provider, capture and signal fixtures.
#![allow(dead_code)]

use anyhow::Result;
use loqa_interviewer::audio::{encode_wav, AudioChunk, AudioFrame, CaptureDevice};
use loqa_interviewer::dialogue::QuestionSource;
use loqa_interviewer::error::{InterviewError, ProviderKind};
use loqa_interviewer::providers::{ChatMessage, LanguageModel, Synthesizer, Transcriber};
use loqa_interviewer::session::{InterviewParams, SessionServices};
use loqa_interviewer::InMemoryActivityStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const SAMPLE_RATE: u32 = 16000;
pub const WINDOW: usize = 512;

// ============================================================================
// Signals
// ============================================================================

fn samples_for(ms: u64) -> usize {
    (SAMPLE_RATE as u64 * ms / 1000) as usize
}

/// Broadband noise well above the speech threshold
pub fn noise(ms: u64) -> Vec<i16> {
    noise_samples(samples_for(ms))
}

pub fn noise_samples(n: usize) -> Vec<i16> {
    let mut state: u32 = 0x1234_5678;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 16) as i32 % 16000 - 8000) as i16
        })
        .collect()
}

pub fn silence(ms: u64) -> Vec<i16> {
    vec![0; samples_for(ms)]
}

/// Cut a sample stream into window-sized capture frames
pub fn frames(samples: &[i16]) -> Vec<AudioFrame> {
    samples
        .chunks(WINDOW)
        .enumerate()
        .map(|(i, chunk)| AudioFrame {
            samples: chunk.to_vec(),
            sample_rate: SAMPLE_RATE,
            channels: 1,
            timestamp_ms: (i * WINDOW) as u64 * 1000 / SAMPLE_RATE as u64,
        })
        .collect()
}

/// One spoken answer: speech followed by enough silence to close it
pub fn answer(speech_ms: u64) -> Vec<i16> {
    let mut samples = noise(speech_ms);
    samples.extend(silence(1600));
    samples
}

pub fn wav_of(secs: f64) -> Vec<u8> {
    let n = (SAMPLE_RATE as f64 * secs) as usize;
    encode_wav(&vec![0i16; n], SAMPLE_RATE).expect("encode wav")
}

pub fn params() -> InterviewParams {
    InterviewParams::new("System Design", "Backend Engineer", "senior")
}

// ============================================================================
// Providers
// ============================================================================

/// Returns queued replies in order, then a default reply
pub struct MockModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    default_reply: String,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new(default_reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: default_reply.to_string(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_replies(default_reply: &str, replies: Vec<Result<String, String>>) -> Self {
        let model = Self::new(default_reply);
        *model.replies.lock().unwrap() = replies.into();
        model
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LanguageModel for MockModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
    ) -> loqa_interviewer::error::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(InterviewError::provider(ProviderKind::Generation, message)),
            None => Ok(self.default_reply.clone()),
        }
    }
}

pub struct MockTranscriber {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        encoding: &str,
    ) -> loqa_interviewer::error::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(encoding, "audio/wav");
        assert!(!audio.is_empty());
        self.text
            .clone()
            .ok_or_else(|| InterviewError::provider(ProviderKind::Transcription, "offline"))
    }
}

pub struct MockSynthesizer {
    secs: Option<f64>,
    pub calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn speaking_for(secs: f64) -> Self {
        Self {
            secs: Some(secs),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            secs: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str) -> loqa_interviewer::error::Result<Vec<AudioChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.secs {
            // Two chunks, to exercise multi-chunk delivery
            Some(secs) => Ok(vec![
                AudioChunk {
                    bytes: wav_of(secs / 2.0),
                    sequence_hint: 0,
                },
                AudioChunk {
                    bytes: wav_of(secs / 2.0),
                    sequence_hint: 1,
                },
            ]),
            None => Err(InterviewError::provider(ProviderKind::Synthesis, "voice unavailable")),
        }
    }
}

pub struct StaticQuestions(pub Vec<String>);

impl StaticQuestions {
    pub fn numbered(n: usize) -> Self {
        Self((1..=n).map(|i| format!("Question number {}?", i)).collect())
    }
}

#[async_trait::async_trait]
impl QuestionSource for StaticQuestions {
    async fn generate(
        &self,
        _params: &InterviewParams,
        count: usize,
    ) -> loqa_interviewer::error::Result<Vec<String>> {
        Ok(self.0.iter().take(count).cloned().collect())
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Capture device replaying prepared frames
pub struct FakeCapture {
    frames: Vec<AudioFrame>,
    keep_open: bool,
    holder: Option<mpsc::Sender<AudioFrame>>,
    capturing: bool,
    pub stops: Arc<AtomicUsize>,
}

impl FakeCapture {
    /// The stream closes once every frame has been read
    pub fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            keep_open: false,
            holder: None,
            capturing: false,
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The stream stays open after the prepared frames
    pub fn open_ended(frames: Vec<AudioFrame>) -> Self {
        Self {
            keep_open: true,
            ..Self::new(frames)
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FakeCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(self.frames.len() + 1);
        for frame in self.frames.drain(..) {
            tx.try_send(frame)?;
        }
        if self.keep_open {
            self.holder = Some(tx);
        }
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.holder = None;
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Fixture {
    pub transcriber: Arc<MockTranscriber>,
    pub model: Arc<MockModel>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub store: Arc<InMemoryActivityStore>,
    pub services: SessionServices,
}

impl Fixture {
    pub fn new(
        transcriber: MockTranscriber,
        model: MockModel,
        synthesizer: MockSynthesizer,
        questions: StaticQuestions,
    ) -> Self {
        let transcriber = Arc::new(transcriber);
        let model = Arc::new(model);
        let synthesizer = Arc::new(synthesizer);
        let store = Arc::new(InMemoryActivityStore::new());
        let services = SessionServices {
            transcriber: transcriber.clone(),
            model: model.clone(),
            synthesizer: synthesizer.clone(),
            questions: Arc::new(questions),
            store: store.clone(),
        };
        Self {
            transcriber,
            model,
            synthesizer,
            store,
            services,
        }
    }
}
