//! Assistant engine collaborator interface.
//!
//! The conversational engine itself lives outside this crate; the bridge
//! only needs a way to subscribe to its event feed and to hand it a
//! message. The embedding sidecar installs a concrete engine on the
//! [`crate::state::AppState`] at startup.

use async_trait::async_trait;
use ember_types::AssistantEvent;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced by the assistant engine while driving an exchange.
///
/// These are domain outcomes of the tool, not protocol failures: the
/// bridge turns them into `isError: true` tool results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine rejected or failed to process the message.
    #[error("{0}")]
    Exchange(String),
}

/// An opaque, event-emitting conversational engine.
///
/// One engine instance serves the whole process. The engine drives a
/// single stateful conversation; callers must not assume two concurrent
/// exchanges are supported.
#[async_trait]
pub trait AssistantEngine: Send + Sync {
    /// Subscribe to the engine's event feed. Dropping the receiver
    /// releases the subscription.
    fn subscribe(&self) -> broadcast::Receiver<AssistantEvent>;

    /// Send a user message to the engine. Events produced while the
    /// engine works arrive on the feed; this call resolves when the
    /// engine has accepted (not necessarily finished) the exchange.
    async fn send(&self, message: &str) -> Result<(), EngineError>;
}
