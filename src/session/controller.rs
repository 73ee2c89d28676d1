use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::params::InterviewParams;
use super::phase::Phase;
use super::stats::{SessionSummary, Speaker, Turn};
use crate::dialogue::{AgentUtterance, DialogueMode};
use crate::error::{InterviewError, Result};
use crate::transport::{ServerMessage, StatusLabel, TransportSender};

/// Per-session state machine
///
/// Owns the phase, the append-only history and the completion flag. Every
/// operation checks the current phase first, so the phase field is the only
/// lock the pipeline needs. Provider calls happen outside, in the runner.
pub struct SessionController {
    id: String,
    params: InterviewParams,
    mode: DialogueMode,
    phase: Phase,
    history: Vec<Turn>,
    is_complete: bool,
    /// The terminal utterance was accepted and is waiting for playback
    completion_pending: bool,
    finished: bool,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    transport: TransportSender,
}

impl SessionController {
    pub fn new(
        id: impl Into<String>,
        params: InterviewParams,
        mode: DialogueMode,
        transport: TransportSender,
    ) -> Self {
        Self {
            id: id.into(),
            params,
            mode,
            phase: Phase::Idle,
            history: Vec::new(),
            is_complete: false,
            completion_pending: false,
            finished: false,
            started_at: Utc::now(),
            ended_at: None,
            transport,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &InterviewParams {
        &self.params
    }

    pub fn mode(&self) -> DialogueMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn transport(&self) -> &TransportSender {
        &self.transport
    }

    /// Validate parameters and enter `connecting`
    ///
    /// On invalid parameters the session stays `idle` and nothing is sent.
    pub fn start(&mut self) -> Result<()> {
        self.params.validate()?;
        self.transition(Phase::Connecting)?;
        self.started_at = Utc::now();

        info!(
            "Session {} connecting: topic={}, role={}, level={}, mode={:?}",
            self.id, self.params.topic, self.params.role, self.params.level, self.mode
        );
        self.transport.send(ServerMessage::status(StatusLabel::Connected));
        Ok(())
    }

    /// Connection established and dialogue prepared: start listening
    pub fn ready(&mut self) -> Result<()> {
        self.transition(Phase::Listening)
    }

    /// The agent speaks first: `listening -> generating` with no user turn
    pub fn begin_opening(&mut self) -> Result<()> {
        self.expect_phase(Phase::Listening, Phase::Generating)?;
        self.transition(Phase::Generating)
    }

    pub fn on_utterance_ready(&mut self) -> Result<()> {
        self.expect_phase(Phase::Listening, Phase::Transcribing)?;
        self.transition(Phase::Transcribing)
    }

    /// Returns whether a user turn was recorded
    ///
    /// Blank transcripts are no-op turns: back to `listening`, history untouched.
    pub fn on_transcript(&mut self, text: &str) -> Result<bool> {
        self.expect_phase(Phase::Transcribing, Phase::Generating)?;

        let text = text.trim();
        if text.is_empty() {
            debug!("Empty transcript, back to listening");
            self.transition(Phase::Listening)?;
            return Ok(false);
        }

        self.history.push(Turn::new(Speaker::User, text));
        self.transport
            .send(ServerMessage::transcript(Speaker::User, text));
        self.transition(Phase::Generating)?;
        Ok(true)
    }

    pub fn on_agent_utterance(&mut self, utterance: &AgentUtterance) -> Result<()> {
        self.expect_phase(Phase::Generating, Phase::Speaking)?;

        self.history
            .push(Turn::new(Speaker::Agent, utterance.text.clone()));
        if let Some(question) = &utterance.question {
            self.transport.send(question.clone().into());
        }
        self.transport
            .send(ServerMessage::transcript(Speaker::Agent, utterance.text.clone()));

        if utterance.complete {
            info!("Session {} received its closing utterance", self.id);
            self.completion_pending = true;
        }

        self.transition(Phase::Speaking)
    }

    /// The agent turn finished playing (naturally or by barge-in)
    ///
    /// Returns the phase entered: `listening`, or `ending` after the closing turn.
    pub fn on_playback_complete(&mut self) -> Result<Phase> {
        self.expect_phase(Phase::Speaking, Phase::Listening)?;

        if self.completion_pending {
            self.transition(Phase::Ending)?;
            self.is_complete = true;
            info!("Session {} complete", self.id);
        } else {
            self.transition(Phase::Listening)?;
        }
        Ok(self.phase)
    }

    /// Nothing audible to say: wind the session down
    pub fn on_synthesis_failed(&mut self) -> Result<()> {
        self.expect_phase(Phase::Speaking, Phase::Ending)?;
        warn!("Session {} ending after synthesis failure", self.id);
        self.transition(Phase::Ending)
    }

    /// Enter the error state and tell the client, gracefully
    pub fn fail(&mut self, message: &str) {
        if !self.phase.can_transition_to(Phase::Error) {
            return;
        }
        if self.transition(Phase::Error).is_ok() {
            self.transport
                .send(ServerMessage::status(StatusLabel::Error));
            self.transport.send(ServerMessage::Error {
                message: message.to_string(),
            });
        }
    }

    /// Tear down; safe to call any number of times
    ///
    /// Returns true only for the call that actually finished the session.
    pub fn finish(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;

        if self.phase != Phase::Closed {
            debug!("Session {}: {} -> closed", self.id, self.phase);
            self.phase = Phase::Closed;
        }
        self.ended_at = Some(Utc::now());
        self.transport.finish();

        info!(
            "Session {} finished: {} turns, complete={}",
            self.id,
            self.history.len(),
            self.is_complete
        );
        true
    }

    pub fn summary(&self, questions_asked: usize) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            params: self.params.clone(),
            mode: self.mode,
            started_at: self.started_at,
            ended_at: self.ended_at.unwrap_or_else(Utc::now),
            turns: self.history.clone(),
            questions_asked,
            completed: self.is_complete,
        }
    }

    fn expect_phase(&self, required: Phase, next: Phase) -> Result<()> {
        if self.phase != required {
            return Err(InterviewError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: Phase) -> Result<()> {
        let from = self.phase;
        let allowed = from.can_transition_to(next)
            && (!self.is_complete || (from == Phase::Ending && next == Phase::Closed));

        if !allowed {
            return Err(InterviewError::InvalidTransition { from, to: next });
        }

        debug!("Session {}: {} -> {}", self.id, from, next);
        self.phase = next;
        Ok(())
    }
}
