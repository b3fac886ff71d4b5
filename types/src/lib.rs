//! Shared types for the Ember MCP bridge.
//!
//! This crate contains the event types exchanged between the bridge
//! backend and the assistant engine collaborator.

/// Default port for the Ember bridge server.
pub const DEFAULT_PORT: u16 = 8080;

pub mod events;

pub use events::AssistantEvent;
