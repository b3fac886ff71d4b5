//! Application state management.

use crate::engine::AssistantEngine;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// The engine slot: either a live engine or the reason none is attached.
enum EngineSlot {
    Ready(Arc<dyn AssistantEngine>),
    Unavailable { reason: String },
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// The assistant engine collaborator, installed by the embedding
    /// sidecar once its own session is up
    engine: RwLock<EngineSlot>,
}

impl AppState {
    /// Create new application state with no engine attached.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine: RwLock::new(EngineSlot::Unavailable {
                    reason: "assistant engine not attached".to_string(),
                }),
            }),
        }
    }

    /// Install the assistant engine. Tool calls stream from this point on.
    pub async fn set_engine(&self, engine: Arc<dyn AssistantEngine>) {
        let mut slot = self.inner.engine.write().await;
        *slot = EngineSlot::Ready(engine);
        info!("Assistant engine attached");
    }

    /// Mark the engine unavailable with an explanation for callers.
    pub async fn set_engine_unavailable(&self, reason: impl Into<String>) {
        let mut slot = self.inner.engine.write().await;
        *slot = EngineSlot::Unavailable {
            reason: reason.into(),
        };
    }

    /// Get the engine if one is ready, else the unavailability reason.
    pub async fn engine(&self) -> Result<Arc<dyn AssistantEngine>, String> {
        let slot = self.inner.engine.read().await;
        match &*slot {
            EngineSlot::Ready(engine) => Ok(engine.clone()),
            EngineSlot::Unavailable { reason } => Err(reason.clone()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
