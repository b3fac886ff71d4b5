//! Events emitted by the assistant engine during a conversational exchange.

use serde::{Deserialize, Serialize};

/// Event types emitted by the assistant engine while it works on a prompt.
///
/// Within one exchange the engine emits zero or more `MessageDelta` and
/// `ToolStarted` events followed by exactly one `MessageEnd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AssistantEvent {
    /// An incremental text token of the assistant's reply
    MessageDelta { text: String },
    /// The assistant started executing one of its own tools
    ToolStarted { tool_name: String },
    /// The exchange finished; carries the complete reply text if the
    /// engine assembled one (otherwise consumers fall back to the
    /// concatenated deltas)
    MessageEnd { final_text: Option<String> },
}

impl AssistantEvent {
    /// Short human-readable description for logging.
    pub fn description(&self) -> &'static str {
        match self {
            AssistantEvent::MessageDelta { .. } => "message delta",
            AssistantEvent::ToolStarted { .. } => "tool started",
            AssistantEvent::MessageEnd { .. } => "message end",
        }
    }
}
