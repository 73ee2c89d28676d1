pub mod audio;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod http;
pub mod providers;
pub mod session;
pub mod store;
pub mod transport;

pub use audio::{
    AudioChunk, AudioFrame, CaptureDevice, PlaybackScheduler, StreamCapture, Utterance, VadConfig,
    VadEndpointer,
};
pub use config::Config;
pub use dialogue::{AgentUtterance, DialogueMode, DialoguePolicy};
pub use error::{InterviewError, ProviderKind};
pub use http::{create_router, AppState};
pub use session::{
    InterviewParams, Phase, SessionController, SessionManager, SessionRunner, SessionSummary,
    StartRequest, Turn,
};
pub use store::{ActivityStore, InMemoryActivityStore};
pub use transport::{ClientMessage, ServerMessage, TransportSender};
