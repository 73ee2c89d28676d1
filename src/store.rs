//! Activity persistence collaborator

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::session::SessionSummary;

/// Stores finished-session summaries
#[async_trait::async_trait]
pub trait ActivityStore: Send + Sync {
    async fn save_activity(&self, summary: SessionSummary) -> Result<()>;

    async fn get_activity(&self, id: &str) -> Result<Option<SessionSummary>>;
}

/// Process-local store, suitable for a single server instance
#[derive(Clone, Default)]
pub struct InMemoryActivityStore {
    activities: Arc<RwLock<HashMap<String, SessionSummary>>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.activities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.activities.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn save_activity(&self, summary: SessionSummary) -> Result<()> {
        info!(
            "Saving activity {} ({} turns, completed={})",
            summary.id,
            summary.turns.len(),
            summary.completed
        );
        let mut activities = self.activities.write().await;
        activities.insert(summary.id.clone(), summary);
        Ok(())
    }

    async fn get_activity(&self, id: &str) -> Result<Option<SessionSummary>> {
        let activities = self.activities.read().await;
        Ok(activities.get(id).cloned())
    }
}
