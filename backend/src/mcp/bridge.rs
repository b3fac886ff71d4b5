//! Tool-call streaming bridge.
//!
//! Bridges the one-shot JSON-RPC request/response model to the engine's
//! long-running, event-driven exchange. The dispatcher hands over here
//! after validating a `tools/call`; the bridge opens a push channel,
//! returns it immediately, and keeps translating engine events into
//! JSON-RPC frames on a detached task.

use crate::engine::AssistantEngine;
use ember_types::AssistantEvent;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Buffered frames between the bridge task and the HTTP response.
const FRAME_BUFFER: usize = 64;

/// Cap on the delta accumulator. Deltas past the cap are still forwarded
/// as notifications but no longer buffered for the fallback final text.
const MAX_ACCUMULATED_BYTES: usize = 1024 * 1024;

/// Start a tool call exchange against the engine.
///
/// Returns the receiving end of the push channel immediately; each item
/// is one pre-serialized JSON-RPC frame. The channel closes after the
/// final result frame (or after an error result), never before.
pub fn run_tool_call(
    engine: Arc<dyn AssistantEngine>,
    id: Value,
    message: String,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(drive_exchange(engine, id, message, FrameSink { tx }));
    rx
}

/// Writable end of the push channel, shared with the detached task.
struct FrameSink {
    tx: mpsc::Sender<String>,
}

impl FrameSink {
    /// Write one frame. A false return means the client is gone; the
    /// caller keeps draining engine events but stops caring about
    /// delivery.
    async fn send_json(&self, value: &Value) -> bool {
        let frame = match serde_json::to_string(value) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize stream frame: {}", e);
                return false;
            }
        };
        self.tx.send(frame).await.is_ok()
    }
}

/// `notifications/message` frame carrying incremental output.
fn log_notification(text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": {
            "level": "info",
            "data": text,
        }
    })
}

/// The final result frame, correlated to the original request id.
fn tool_result(id: &Value, text: &str, is_error: bool) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        }
    })
}

/// Drive one exchange: subscribe, send the message, translate events
/// until the terminal one, finalize exactly once.
///
/// The broadcast receiver is dropped when this function returns, which
/// releases the engine subscription on every exit path. Dropping the
/// sink closes the push channel.
async fn drive_exchange(
    engine: Arc<dyn AssistantEngine>,
    id: Value,
    message: String,
    sink: FrameSink,
) {
    // Subscribe before sending so no event can be missed.
    let mut events = engine.subscribe();
    let mut accumulated = String::new();
    let mut finished = false;

    let send_fut = engine.send(&message);
    tokio::pin!(send_fut);
    let mut send_done = false;

    loop {
        tokio::select! {
            result = &mut send_fut, if !send_done => {
                send_done = true;
                if let Err(e) = result {
                    // A failure inside the tool's own work is a domain
                    // outcome, reported in a successful envelope.
                    if !finished {
                        finished = true;
                        sink.send_json(&tool_result(&id, &format!("Error: {}", e), true)).await;
                    }
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if finished {
                        // Late event racing the terminal one
                        continue;
                    }
                    debug!("MCP stream: {}", event.description());
                    match event {
                        AssistantEvent::MessageDelta { text } => {
                            if accumulated.len() < MAX_ACCUMULATED_BYTES {
                                accumulated.push_str(&text);
                            }
                            sink.send_json(&log_notification(&text)).await;
                        }
                        AssistantEvent::ToolStarted { tool_name } => {
                            sink.send_json(&log_notification(&format!("[tool: {}]", tool_name)))
                                .await;
                        }
                        AssistantEvent::MessageEnd { final_text } => {
                            finished = true;
                            let text = match final_text {
                                Some(text) if !text.is_empty() => text,
                                _ => std::mem::take(&mut accumulated),
                            };
                            sink.send_json(&tool_result(&id, &text, false)).await;
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("MCP stream lagged, skipped {} engine events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    if !finished {
                        finished = true;
                        sink.send_json(&tool_result(
                            &id,
                            "Error: assistant event feed closed before the exchange finished",
                            true,
                        ))
                        .await;
                    }
                    break;
                }
            }
        }
    }
}
