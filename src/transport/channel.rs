use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::ServerMessage;

/// Signals from the transport that steer a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Barge-in: stop agent playback now
    Interrupt,
    /// Explicit stop request (client message or HTTP API)
    Stop,
    /// The channel closed underneath the session
    Disconnected,
}

/// Write side of a session's streaming channel
///
/// Messages are delivered in send order. After `finish` (or once the reader
/// is gone) every send is a silent no-op, so normal completion and abrupt
/// disconnect can race freely.
#[derive(Debug, Clone)]
pub struct TransportSender {
    tx: mpsc::UnboundedSender<ServerMessage>,
    finished: Arc<AtomicBool>,
}

/// Create a connected sender/receiver pair
pub fn channel() -> (TransportSender, mpsc::UnboundedReceiver<ServerMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TransportSender {
            tx,
            finished: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

impl TransportSender {
    /// Queue a message; returns whether it was accepted
    pub fn send(&self, message: ServerMessage) -> bool {
        if self.finished.load(Ordering::SeqCst) {
            debug!("Dropping {} message after finish", message.kind());
            return false;
        }
        self.tx.send(message).is_ok()
    }

    /// Emit `finished` exactly once; later calls do nothing
    pub fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        // The reader may already be gone
        let _ = self.tx.send(ServerMessage::Finished);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
