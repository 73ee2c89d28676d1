//! Async per-session pipeline.
//!
//! capture → VAD boundary → transcription → dialogue policy → synthesis →
//! playback → back to capture, strictly one stage at a time. Every provider
//! call is bounded by a timeout and raced against the control channel so a
//! stop or disconnect aborts it immediately.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::controller::SessionController;
use super::phase::Phase;
use super::stats::SessionSummary;
use crate::audio::capture::to_mono;
use crate::audio::{
    AudioFrame, CaptureDevice, PlaybackClock, PlaybackScheduler, TokioClock, Utterance, VadConfig,
    VadEndpointer, VadEvent,
};
use crate::dialogue::{DialoguePolicy, QuestionSource};
use crate::error::{InterviewError, ProviderKind, Result};
use crate::providers::{LanguageModel, Synthesizer, Transcriber};
use crate::store::ActivityStore;
use crate::transport::{ControlSignal, ServerMessage, StatusLabel};

/// Encoding hint passed with every utterance
const UTTERANCE_ENCODING: &str = "audio/wav";

/// External collaborators shared by every session
#[derive(Clone)]
pub struct SessionServices {
    pub transcriber: Arc<dyn Transcriber>,
    pub model: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub questions: Arc<dyn QuestionSource>,
    pub store: Arc<dyn ActivityStore>,
}

/// How the dialogue policy is set up once the session is connecting
#[derive(Debug, Clone)]
pub enum DialoguePlan {
    /// Pre-generated questions; when empty, `count` are generated first
    Scripted { questions: Vec<String>, count: usize },
    FreeForm {
        terminal_phrase: String,
        max_turns: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub vad: VadConfig,
    pub sample_rate: u32,
    pub provider_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            sample_rate: 16000,
            provider_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// A stop was requested; tear down
    Stop,
}

enum Incoming {
    Frame(Option<AudioFrame>),
    Signal(Option<ControlSignal>),
}

pub struct SessionRunner<C: PlaybackClock = TokioClock> {
    controller: SessionController,
    plan: DialoguePlan,
    policy: Option<DialoguePolicy>,
    services: SessionServices,
    capture: Box<dyn CaptureDevice>,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    endpointer: VadEndpointer,
    /// Utterances completed in the same frame as the one being handled
    ready: VecDeque<Utterance>,
    scheduler: PlaybackScheduler<C>,
    control: mpsc::Receiver<ControlSignal>,
    provider_timeout: Duration,
}

impl SessionRunner<TokioClock> {
    pub fn new(
        controller: SessionController,
        plan: DialoguePlan,
        services: SessionServices,
        capture: Box<dyn CaptureDevice>,
        control: mpsc::Receiver<ControlSignal>,
        config: RunnerConfig,
    ) -> Self {
        Self::with_clock(
            controller,
            plan,
            services,
            capture,
            control,
            config,
            TokioClock::new(),
        )
    }
}

impl<C: PlaybackClock> SessionRunner<C> {
    pub fn with_clock(
        controller: SessionController,
        plan: DialoguePlan,
        services: SessionServices,
        capture: Box<dyn CaptureDevice>,
        control: mpsc::Receiver<ControlSignal>,
        config: RunnerConfig,
        clock: C,
    ) -> Self {
        Self {
            controller,
            plan,
            policy: None,
            services,
            capture,
            frames: None,
            endpointer: VadEndpointer::new(config.vad, config.sample_rate),
            ready: VecDeque::new(),
            scheduler: PlaybackScheduler::new(clock),
            control,
            provider_timeout: config.provider_timeout,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn policy(&self) -> Option<&DialoguePolicy> {
        self.policy.as_ref()
    }

    /// Run the session to completion and return its summary
    ///
    /// Only a `ValidationError` is returned as `Err`; every later failure is
    /// recovered or ends the session gracefully.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        self.controller.start()?;

        if let Err(e) = self.drive().await {
            match &e {
                InterviewError::Transport(reason) => {
                    info!("Session {} transport closed: {}", self.controller.id(), reason);
                    self.controller.fail("The connection was lost.");
                }
                other => {
                    error!("Session {} failed: {}", self.controller.id(), other);
                    self.controller
                        .fail("Sorry, something went wrong and the interview has to end.");
                }
            }
        }

        self.finish().await;
        Ok(self.summary())
    }

    /// Tear the session down; idempotent
    ///
    /// Releases the capture device, drops pending playback and persists the
    /// summary, all exactly once.
    pub async fn finish(&mut self) -> bool {
        if !self.controller.finish() {
            return false;
        }

        self.frames = None;
        if let Err(e) = self.capture.stop().await {
            warn!("Failed to release capture device {}: {}", self.capture.name(), e);
        }

        if !self.scheduler.pending().is_empty() {
            self.scheduler.interrupt();
        }

        if let Err(e) = self.services.store.save_activity(self.summary()).await {
            warn!("Failed to save activity {}: {}", self.controller.id(), e);
        }
        true
    }

    pub fn summary(&self) -> SessionSummary {
        let asked = self.policy.as_ref().map_or(0, DialoguePolicy::questions_asked);
        self.controller.summary(asked)
    }

    async fn drive(&mut self) -> Result<()> {
        let Some(policy) = self.prepare_policy().await? else {
            return Ok(());
        };
        self.policy = Some(policy);

        let frames = self
            .capture
            .start()
            .await
            .map_err(|e| InterviewError::Transport(format!("capture unavailable: {}", e)))?;
        self.frames = Some(frames);
        info!("Session {} capturing from {}", self.controller.id(), self.capture.name());

        self.controller.ready()?;
        self.controller.begin_opening()?;
        if self.agent_turn().await? == Flow::Stop {
            return Ok(());
        }

        loop {
            match self.controller.phase() {
                Phase::Listening => {
                    let Some(utterance) = self.listen().await? else {
                        return Ok(());
                    };
                    if self.handle_utterance(utterance).await? == Flow::Stop {
                        return Ok(());
                    }
                }
                Phase::Ending | Phase::Closed => return Ok(()),
                other => {
                    return Err(InterviewError::InvalidTransition {
                        from: other,
                        to: Phase::Listening,
                    })
                }
            }
        }
    }

    /// Build the dialogue policy, generating questions first when needed
    async fn prepare_policy(&mut self) -> Result<Option<DialoguePolicy>> {
        let params = self.controller.params().clone();

        let policy = match self.plan.clone() {
            DialoguePlan::FreeForm {
                terminal_phrase,
                max_turns,
            } => DialoguePolicy::free_form(params, &terminal_phrase, max_turns),
            DialoguePlan::Scripted { questions, .. } if !questions.is_empty() => {
                DialoguePolicy::scripted(params, questions)
            }
            DialoguePlan::Scripted { count, .. } => {
                let transport = self.controller.transport().clone();
                transport.send(ServerMessage::status(StatusLabel::GeneratingQuestions));

                let source = Arc::clone(&self.services.questions);
                let call = tokio::time::timeout(self.provider_timeout, source.generate(&params, count));
                let Some(result) = guarded(&mut self.control, call).await? else {
                    return Ok(None);
                };

                let questions = match result {
                    Ok(Ok(questions)) if !questions.is_empty() => questions,
                    Ok(Ok(_)) => {
                        return Err(InterviewError::provider(
                            ProviderKind::Generation,
                            "question set is empty",
                        ))
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        return Err(InterviewError::provider(
                            ProviderKind::Generation,
                            "question generation timed out",
                        ))
                    }
                };

                info!(
                    "Session {}: {} questions ready",
                    self.controller.id(),
                    questions.len()
                );
                transport.send(ServerMessage::status(StatusLabel::QuestionsReady));
                DialoguePolicy::scripted(params, questions)
            }
        };

        Ok(Some(policy.with_timeout(self.provider_timeout)))
    }

    /// Wait for the next utterance; `None` when the session should stop
    ///
    /// Frames are only read here, so audio captured during the other phases
    /// waits in the capture queue and is endpointed in order once listening
    /// resumes.
    async fn listen(&mut self) -> Result<Option<Utterance>> {
        loop {
            if let Some(utterance) = self.ready.pop_front() {
                return Ok(Some(utterance));
            }

            let Some(frames) = self.frames.as_mut() else {
                return Err(InterviewError::Transport("capture not running".to_string()));
            };

            let incoming = tokio::select! {
                frame = frames.recv() => Incoming::Frame(frame),
                signal = self.control.recv() => Incoming::Signal(signal),
            };

            match incoming {
                Incoming::Frame(Some(frame)) => {
                    for event in self.endpointer.push_frame(&to_mono(frame)) {
                        match event {
                            VadEvent::Utterance(utterance) => self.ready.push_back(utterance),
                            VadEvent::Discarded { voiced_ms } => {
                                let noise = InterviewError::EmptyUtterance { voiced_ms };
                                debug!("{}, still listening", noise);
                            }
                            VadEvent::SpeechStarted { at_ms } => {
                                debug!("Candidate speaking at {}ms", at_ms)
                            }
                        }
                    }
                }
                Incoming::Frame(None) => {
                    return Err(InterviewError::Transport("capture stream closed".to_string()))
                }
                Incoming::Signal(Some(ControlSignal::Interrupt)) => {
                    debug!("Interrupt while listening, nothing to stop");
                }
                Incoming::Signal(Some(ControlSignal::Stop)) => return Ok(None),
                Incoming::Signal(Some(ControlSignal::Disconnected)) | Incoming::Signal(None) => {
                    return Err(InterviewError::Transport("channel closed".to_string()))
                }
            }
        }
    }

    async fn handle_utterance(&mut self, utterance: Utterance) -> Result<Flow> {
        self.controller.on_utterance_ready()?;

        let text = match utterance.to_wav() {
            Ok(wav) => {
                let transcriber = Arc::clone(&self.services.transcriber);
                let call = tokio::time::timeout(
                    self.provider_timeout,
                    transcriber.transcribe(wav, UTTERANCE_ENCODING),
                );
                match guarded(&mut self.control, call).await? {
                    None => return Ok(Flow::Stop),
                    Some(Ok(Ok(text))) => text,
                    Some(Ok(Err(e))) => {
                        warn!("Transcription failed, treating as silence: {}", e);
                        String::new()
                    }
                    Some(Err(_)) => {
                        warn!("Transcription timed out after {:?}", self.provider_timeout);
                        String::new()
                    }
                }
            }
            Err(e) => {
                warn!("Failed to encode utterance: {}", e);
                String::new()
            }
        };

        if !self.controller.on_transcript(&text)? {
            return Ok(Flow::Continue);
        }
        self.agent_turn().await
    }

    /// generating → speaking → (listening | ending)
    async fn agent_turn(&mut self) -> Result<Flow> {
        let Some(policy) = self.policy.as_mut() else {
            warn!("No dialogue policy, stopping session");
            return Ok(Flow::Stop);
        };

        let model = Arc::clone(&self.services.model);
        let history = self.controller.history().to_vec();
        let next = policy.next_turn(&history, model.as_ref());
        let Some(utterance) = guarded(&mut self.control, next).await? else {
            return Ok(Flow::Stop);
        };

        self.controller.on_agent_utterance(&utterance)?;
        self.speak(&utterance.text).await
    }

    async fn speak(&mut self, text: &str) -> Result<Flow> {
        let synthesizer = Arc::clone(&self.services.synthesizer);
        let call = tokio::time::timeout(self.provider_timeout, synthesizer.synthesize(text));

        let mut chunks = match guarded(&mut self.control, call).await? {
            None => return Ok(Flow::Stop),
            Some(Ok(Ok(chunks))) => chunks,
            Some(Ok(Err(e))) => {
                error!("Synthesis failed: {}", e);
                Vec::new()
            }
            Some(Err(_)) => {
                error!("Synthesis timed out after {:?}", self.provider_timeout);
                Vec::new()
            }
        };
        chunks.sort_by_key(|chunk| chunk.sequence_hint);

        let mut scheduled = 0;
        for chunk in &chunks {
            match self.scheduler.schedule(chunk) {
                Ok(buffer) => {
                    self.controller
                        .transport()
                        .send(ServerMessage::audio(&chunk.bytes, buffer.sequence));
                    scheduled += 1;
                }
                Err(e) => warn!("Skipping undecodable audio chunk: {}", e),
            }
        }

        if scheduled == 0 {
            self.controller.on_synthesis_failed()?;
            return Ok(Flow::Continue);
        }

        if self.await_playback().await? == Flow::Stop {
            return Ok(Flow::Stop);
        }

        // The endpointer is not reset here. Capture is one continuous stream:
        // speech that began over the agent (barge-in) is still queued and
        // must be endpointed from its real start.
        self.controller.on_playback_complete()?;
        Ok(Flow::Continue)
    }

    /// Wait until the scheduled turn has played out or is interrupted
    async fn await_playback(&mut self) -> Result<Flow> {
        loop {
            let remaining = self.scheduler.remaining();
            if remaining <= 0.0 {
                return Ok(Flow::Continue);
            }

            // Timer resolution is 1ms; never sleep for less
            let wait = Duration::from_secs_f64(remaining).max(Duration::from_millis(1));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                signal = self.control.recv() => match signal {
                    Some(ControlSignal::Interrupt) => {
                        info!("Barge-in on session {}", self.controller.id());
                        self.scheduler.interrupt();
                        return Ok(Flow::Continue);
                    }
                    Some(ControlSignal::Stop) => return Ok(Flow::Stop),
                    Some(ControlSignal::Disconnected) | None => {
                        return Err(InterviewError::Transport("channel closed".to_string()))
                    }
                },
            }
        }
    }
}

/// Await `call`, aborting on stop or disconnect
///
/// Interrupts are ignored here: only playback can be barged in on.
async fn guarded<F: Future>(
    control: &mut mpsc::Receiver<ControlSignal>,
    call: F,
) -> Result<Option<F::Output>> {
    tokio::pin!(call);
    loop {
        tokio::select! {
            output = &mut call => return Ok(Some(output)),
            signal = control.recv() => match signal {
                Some(ControlSignal::Interrupt) => debug!("Interrupt ignored outside playback"),
                Some(ControlSignal::Stop) => return Ok(None),
                Some(ControlSignal::Disconnected) | None => {
                    return Err(InterviewError::Transport("channel closed".to_string()))
                }
            },
        }
    }
}
