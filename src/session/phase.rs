use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of an interview session
///
/// `Listening`, `Transcribing`, `Generating` and `Speaking` are the active
/// turn phases; exactly one of them holds while a session is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Listening,
    Transcribing,
    Generating,
    Speaking,
    Ending,
    Closed,
    Error,
}

impl Phase {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;

        // Error and teardown are reachable from any non-terminal phase
        if next == Closed {
            return self != Closed;
        }
        if next == Error {
            return !matches!(self, Closed | Error | Ending);
        }

        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Listening)
                | (Listening, Transcribing)
                | (Listening, Generating)
                | (Transcribing, Listening)
                | (Transcribing, Generating)
                | (Generating, Speaking)
                | (Speaking, Listening)
                | (Speaking, Ending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Listening => "listening",
            Phase::Transcribing => "transcribing",
            Phase::Generating => "generating",
            Phase::Speaking => "speaking",
            Phase::Ending => "ending",
            Phase::Closed => "closed",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
