use std::sync::Arc;

use crate::config::Config;
use crate::session::{SessionManager, SessionServices};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active interview sessions (session_id → handle)
    pub sessions: SessionManager,

    /// Provider adapters and collaborators shared by every session
    pub services: SessionServices,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, services: SessionServices) -> Self {
        Self {
            sessions: SessionManager::new(),
            services,
            config: Arc::new(config),
        }
    }
}
