//! MCP session registry.
//!
//! Tracks the identifiers of active MCP sessions. A session carries no
//! state beyond its identity: it exists from a successful `initialize`
//! until explicit termination or process shutdown. Nothing is persisted
//! across restarts; a multi-process deployment would need to revisit
//! this (known limitation inherited from the surrounding system's
//! one-sidecar-per-process design).

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Registry of active MCP session identifiers.
///
/// Shared across all in-flight requests; the three operations are
/// serialized through a single lock.
#[derive(Clone, Default)]
pub struct McpSessionRegistry {
    sessions: Arc<RwLock<HashSet<String>>>,
}

impl McpSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session and return its identifier.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone());
        info!("Created MCP session: {}", id);
        id
    }

    /// Check whether a session identifier is live.
    pub async fn exists(&self, id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains(id)
    }

    /// Remove a session. Removing an absent identifier is not an error;
    /// a removed identifier is never revived.
    pub async fn remove(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id) {
            info!("Terminated MCP session: {}", id);
        }
    }

    /// Number of active sessions.
    pub async fn count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}
