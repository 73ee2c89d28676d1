use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use super::params::InterviewParams;
use super::stats::SessionStatus;
use crate::dialogue::DialogueMode;
use crate::transport::ControlSignal;

/// Registry entry for a live session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    pub params: InterviewParams,
    pub mode: DialogueMode,
    pub started_at: DateTime<Utc>,
    control: mpsc::Sender<ControlSignal>,
}

impl SessionHandle {
    pub fn new(
        id: String,
        params: InterviewParams,
        mode: DialogueMode,
        control: mpsc::Sender<ControlSignal>,
    ) -> Self {
        Self {
            id,
            params,
            mode,
            started_at: Utc::now(),
            control,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id.clone(),
            params: self.params.clone(),
            mode: self.mode,
            started_at: self.started_at,
        }
    }

    /// Deliver a control signal; false if the session already ended
    pub async fn signal(&self, signal: ControlSignal) -> bool {
        self.control.send(signal).await.is_ok()
    }
}

/// Owns the map of active sessions (session_id → handle)
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id is already taken
    pub async fn register(&self, handle: SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&handle.id) {
            return false;
        }
        info!("Registered session {}", handle.id);
        sessions.insert(handle.id.clone(), handle);
        true
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!("Removed session {}", id);
        }
        removed
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<SessionStatus> {
        let sessions = self.sessions.read().await;
        let mut list: Vec<SessionStatus> = sessions.values().map(SessionHandle::status).collect();
        list.sort_by_key(|s| s.started_at);
        list
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ask a session to finish; false if it is unknown or already gone
    pub async fn stop(&self, id: &str) -> bool {
        match self.get(id).await {
            Some(handle) => handle.signal(ControlSignal::Stop).await,
            None => false,
        }
    }
}
