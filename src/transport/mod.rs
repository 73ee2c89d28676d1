//! Duplex streaming channel between clients and sessions
//!
//! Binary frames carry capture audio (client → server). Text frames carry JSON
//! envelopes: `status`, `transcript`, `question`, `audio`, `finished`, `error`
//! (server → client) and `interrupt`/`stop` control (client → server).

pub mod channel;
pub mod messages;

pub use channel::{channel, ControlSignal, TransportSender};
pub use messages::{ClientMessage, ServerMessage, StatusLabel};
