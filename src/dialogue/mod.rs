//! Dialogue policy: decides what the interviewer says next.
//!
//! Two modes, fixed at session start:
//! - **Scripted**: dequeues pre-generated questions in order; the model only
//!   voices injected content. A fixed closing message ends the session.
//! - **Free-form**: the model drives the conversation from the full history
//!   and ends it by opening its final message with the terminal phrase.
//!
//! Provider failures and empty or malformed replies never fail the session;
//! a fixed fallback utterance is substituted instead.

pub mod prompt;
pub mod questions;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::providers::{ChatMessage, LanguageModel};
use crate::session::{InterviewParams, Speaker, Turn};

pub use questions::{parse_questions, LlmQuestionGenerator, QuestionSource};

/// Spoken when the model fails or returns nothing usable
pub const APOLOGY_UTTERANCE: &str =
    "I'm sorry, I didn't quite catch that. Could you say that again?";

/// Spoken after the last scripted question has been answered
pub const CLOSING_MESSAGE: &str = "Thank you, that was my last question. \
     That concludes our interview. We'll be in touch soon with feedback. Goodbye!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogueMode {
    #[default]
    Scripted,
    #[serde(alias = "free_form", alias = "free-form")]
    FreeForm,
}

/// A scripted question handed to the transport as a `question` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionInjection {
    pub text: String,
    /// 1-based position in the question set
    pub index: usize,
    pub total: usize,
}

/// The policy's decision for one agent turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentUtterance {
    pub text: String,
    /// True when this is the session's final utterance
    pub complete: bool,
    pub question: Option<QuestionInjection>,
}

/// Ordered, pre-generated question list
#[derive(Debug, Clone)]
pub struct ScriptedQueue {
    questions: Vec<String>,
    index: usize,
}

impl ScriptedQueue {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            index: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.questions.len()
    }

    pub fn dequeue(&mut self) -> Option<QuestionInjection> {
        let text = self.questions.get(self.index)?.clone();
        self.index += 1;
        Some(QuestionInjection {
            text,
            index: self.index,
            total: self.questions.len(),
        })
    }
}

#[derive(Debug, Clone)]
struct FreeFormState {
    terminal_phrase: String,
    max_turns: usize,
}

#[derive(Debug, Clone)]
enum Strategy {
    Scripted(ScriptedQueue),
    FreeForm(FreeFormState),
}

pub struct DialoguePolicy {
    params: InterviewParams,
    persona: String,
    strategy: Strategy,
    call_timeout: Duration,
    questions_asked: usize,
}

impl DialoguePolicy {
    pub fn scripted(params: InterviewParams, questions: Vec<String>) -> Self {
        let persona = prompt::scripted_persona(&params);
        Self {
            params,
            persona,
            strategy: Strategy::Scripted(ScriptedQueue::new(questions)),
            call_timeout: Duration::from_secs(30),
            questions_asked: 0,
        }
    }

    pub fn free_form(params: InterviewParams, terminal_phrase: &str, max_turns: usize) -> Self {
        let persona = prompt::free_form_persona(&params, terminal_phrase, max_turns);
        Self {
            params,
            persona,
            strategy: Strategy::FreeForm(FreeFormState {
                terminal_phrase: terminal_phrase.to_string(),
                max_turns: max_turns.max(1),
            }),
            call_timeout: Duration::from_secs(30),
            questions_asked: 0,
        }
    }

    /// Bound every model call; an elapsed call counts as a provider failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn mode(&self) -> DialogueMode {
        match self.strategy {
            Strategy::Scripted(_) => DialogueMode::Scripted,
            Strategy::FreeForm(_) => DialogueMode::FreeForm,
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn questions_asked(&self) -> usize {
        self.questions_asked
    }

    /// Total questions in scripted mode
    pub fn question_total(&self) -> Option<usize> {
        match &self.strategy {
            Strategy::Scripted(queue) => Some(queue.total()),
            Strategy::FreeForm(_) => None,
        }
    }

    /// Decide the next agent utterance from the conversation so far
    pub async fn next_turn(&mut self, history: &[Turn], model: &dyn LanguageModel) -> AgentUtterance {
        match self.strategy.clone() {
            Strategy::Scripted(_) => self.next_scripted(history, model).await,
            Strategy::FreeForm(state) => self.next_free_form(history, model, &state).await,
        }
    }

    async fn next_scripted(&mut self, history: &[Turn], model: &dyn LanguageModel) -> AgentUtterance {
        let question = match &mut self.strategy {
            Strategy::Scripted(queue) => queue.dequeue(),
            Strategy::FreeForm(_) => None,
        };

        let Some(question) = question else {
            info!("Question queue exhausted after {} questions", self.questions_asked);
            return AgentUtterance {
                text: CLOSING_MESSAGE.to_string(),
                complete: true,
                question: None,
            };
        };

        let messages = prompt::scripted_messages(&self.persona, &self.params, history, &question);
        let text = match self.generate(model, &messages).await {
            Some(text) => text,
            // The question itself is always a safe thing to say
            None if question.index == 1 => format!(
                "Hi {}, thanks for joining. {}",
                self.params.user_name, question.text
            ),
            None => question.text.clone(),
        };

        self.questions_asked += 1;
        debug!("Asking question {}/{}", question.index, question.total);

        AgentUtterance {
            text,
            complete: false,
            question: Some(question),
        }
    }

    async fn next_free_form(
        &mut self,
        history: &[Turn],
        model: &dyn LanguageModel,
        state: &FreeFormState,
    ) -> AgentUtterance {
        let answers = history.iter().filter(|t| t.speaker == Speaker::User).count();
        let force_close = answers >= state.max_turns;
        if force_close {
            info!("Turn budget of {} reached, steering to close", state.max_turns);
        }

        let messages = prompt::free_form_messages(
            &self.persona,
            &self.params,
            history,
            &state.terminal_phrase,
            force_close,
        );

        let Some(text) = self.generate(model, &messages).await else {
            if force_close {
                return AgentUtterance {
                    text: forced_closing(&state.terminal_phrase),
                    complete: true,
                    question: None,
                };
            }
            return AgentUtterance {
                text: APOLOGY_UTTERANCE.to_string(),
                complete: false,
                question: None,
            };
        };

        if text.starts_with(&state.terminal_phrase) {
            info!("Terminal phrase detected");
            return AgentUtterance {
                text,
                complete: true,
                question: None,
            };
        }

        if force_close {
            warn!("Model ignored the close instruction, appending closing");
            return AgentUtterance {
                text: format!("{} {}", text, forced_closing(&state.terminal_phrase)),
                complete: true,
                question: None,
            };
        }

        self.questions_asked += 1;
        AgentUtterance {
            text,
            complete: false,
            question: None,
        }
    }

    /// One bounded model call; `None` on failure, timeout or unusable output
    async fn generate(&self, model: &dyn LanguageModel, messages: &[ChatMessage]) -> Option<String> {
        match tokio::time::timeout(self.call_timeout, model.generate(messages)).await {
            Ok(Ok(raw)) => {
                let cleaned = sanitize_reply(&raw);
                if cleaned.is_none() {
                    warn!("Discarding empty or malformed model reply");
                }
                cleaned
            }
            Ok(Err(e)) => {
                warn!("Generation failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Generation timed out after {:?}", self.call_timeout);
                None
            }
        }
    }
}

fn forced_closing(terminal_phrase: &str) -> String {
    format!(
        "{}. Thank you for your time, we'll be in touch soon. Goodbye!",
        terminal_phrase.trim_end_matches('.')
    )
}

/// Normalise a model reply for speech; `None` when there is nothing speakable
pub fn sanitize_reply(raw: &str) -> Option<String> {
    let text = raw.trim().trim_matches('"').trim();
    if text.is_empty() {
        return None;
    }
    // Structured payloads leaking into a spoken reply
    if text.starts_with('{') || text.starts_with('[') || text.starts_with("```") {
        return None;
    }
    if !text.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(text.to_string())
}
