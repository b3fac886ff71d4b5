//! MCP JSON-RPC envelope codec and method dispatcher.
//!
//! The dispatcher is the protocol state machine: it routes a decoded
//! request to the correct handler based on method name and session
//! validity, and hands `tools/call` off to the streaming bridge.

use crate::mcp::bridge;
use crate::mcp::session::McpSessionRegistry;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

/// MCP protocol version we report to clients.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Protocol versions accepted at `initialize`.
pub const ACCEPTED_PROTOCOL_VERSIONS: [&str; 2] = ["2025-03-26", "2024-11-05"];

/// The single tool this server exposes.
pub const TOOL_NAME: &str = "talk_to_ember";

/// Usage instructions delivered in the `initialize` result.
const INSTRUCTIONS: &str = "Ember is an AI sidekick that watches your running application. \
It can investigate errors, read source files, run commands, and fix issues. \
Use the talk_to_ember tool to have a stateful conversation with Ember - it \
remembers the full conversation history.";

/// JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 Request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent or null means the message is a notification
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Response.
///
/// Exactly one of `result` and `error` is set. The `id` always echoes
/// the request's identifier, null when the request had none.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Decode a raw request body into a JSON-RPC request.
///
/// Malformed JSON yields a ParseError envelope; a well-formed body that
/// is not a JSON-RPC 2.0 request object yields InvalidRequest, echoing
/// the caller's id when one could be salvaged.
pub fn decode(body: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| JsonRpcResponse::error(Value::Null, PARSE_ERROR, "Parse error"))?;

    let salvaged_id = value.get("id").cloned().unwrap_or(Value::Null);
    let well_shaped = value.is_object()
        && value.get("jsonrpc").and_then(Value::as_str) == Some("2.0")
        && value.get("method").map(Value::is_string).unwrap_or(false);
    if !well_shaped {
        return Err(JsonRpcResponse::error(
            salvaged_id,
            INVALID_REQUEST,
            "Invalid Request",
        ));
    }

    serde_json::from_value(value)
        .map_err(|_| JsonRpcResponse::error(salvaged_id, INVALID_REQUEST, "Invalid Request"))
}

/// The single static tool definition served by `tools/list`.
pub fn tool_definition() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Send a message to Ember, the AI sidekick watching your \
            application. Ember has full context of the codebase, can investigate \
            errors, read files, and fix issues. The conversation is stateful - \
            Ember remembers previous messages.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Your message to Ember"
                }
            },
            "required": ["message"]
        }
    })
}

/// Tool call parameters from MCP.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Outcome of dispatching one decoded request.
///
/// Transport-agnostic: the HTTP adapter maps each variant to a status
/// code and body.
pub enum Dispatch {
    /// A single JSON-RPC response envelope (HTTP 200)
    Reply(JsonRpcResponse),
    /// `initialize` succeeded; the new session id travels out-of-band
    /// as a response header, never inside the JSON-RPC payload
    Initialized {
        reply: JsonRpcResponse,
        session_id: String,
    },
    /// A notification-only method was acknowledged (HTTP 202, no body)
    NotificationAck,
    /// A protocol precondition failed: the method needs a live session
    /// id and none was supplied or found (HTTP 400 with an envelope)
    SessionRequired(JsonRpcResponse),
    /// `tools/call` opened a push channel; each item is one
    /// pre-serialized JSON-RPC frame for the event stream
    Stream(mpsc::Receiver<String>),
}

/// MCP request dispatcher.
pub struct McpHandler;

impl McpHandler {
    /// Dispatch a decoded JSON-RPC request.
    ///
    /// `session_id` is the value of the `Mcp-Session-Id` header, if the
    /// caller supplied one.
    pub async fn handle(
        state: &AppState,
        sessions: &McpSessionRegistry,
        session_id: Option<&str>,
        request: JsonRpcRequest,
    ) -> Dispatch {
        let id = request.id.clone().unwrap_or(Value::Null);
        debug!("MCP: handling method: {}", request.method);

        // initialize, the initialized notification and ping are the only
        // methods not gated on an existing session.
        match request.method.as_str() {
            "initialize" => return Self::handle_initialize(sessions, id, request.params).await,
            "notifications/initialized" => return Dispatch::NotificationAck,
            "ping" => return Dispatch::Reply(JsonRpcResponse::success(id, json!({}))),
            _ => {}
        }

        let session_live = match session_id {
            Some(sid) => sessions.exists(sid).await,
            None => false,
        };
        if !session_live {
            return Dispatch::SessionRequired(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                "Missing or unknown Mcp-Session-Id",
            ));
        }

        match request.method.as_str() {
            "tools/list" => Dispatch::Reply(JsonRpcResponse::success(
                id,
                json!({ "tools": [tool_definition()] }),
            )),
            "tools/call" => Self::handle_tool_call(state, id, request.params).await,
            other => Dispatch::Reply(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    /// Handle `initialize`: validate the protocol version and create a
    /// fresh session.
    async fn handle_initialize(
        sessions: &McpSessionRegistry,
        id: Value,
        params: Option<Value>,
    ) -> Dispatch {
        let requested = params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        match requested {
            Some(version) if ACCEPTED_PROTOCOL_VERSIONS.contains(&version) => {}
            other => {
                return Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!(
                        "Unsupported protocol version: {}",
                        other.unwrap_or("<missing>")
                    ),
                ));
            }
        }

        let session_id = sessions.create().await;
        let reply = JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "ember",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "instructions": INSTRUCTIONS,
            }),
        );
        Dispatch::Initialized { reply, session_id }
    }

    /// Handle `tools/call`: validate the call, then either short-circuit
    /// with a tool-level failure (engine unavailable) or hand off to the
    /// streaming bridge.
    async fn handle_tool_call(state: &AppState, id: Value, params: Option<Value>) -> Dispatch {
        let params: ToolCallParams =
            match serde_json::from_value(params.unwrap_or_else(|| json!({}))) {
                Ok(p) => p,
                Err(_) => {
                    return Dispatch::Reply(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        "Invalid tool call parameters",
                    ));
                }
            };

        if params.name != TOOL_NAME {
            return Dispatch::Reply(JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            ));
        }

        let message = params
            .arguments
            .as_ref()
            .and_then(|a| a.get("message"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let Some(message) = message else {
            return Dispatch::Reply(JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                "arguments.message must be a non-empty string",
            ));
        };

        // Engine unavailability is a tool-level outcome, not a protocol
        // error: report it in a successful envelope without opening a
        // stream.
        let engine = match state.engine().await {
            Ok(engine) => engine,
            Err(reason) => {
                return Dispatch::Reply(JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": format!("Ember is not available: {}", reason)
                        }],
                        "isError": true,
                    }),
                ));
            }
        };

        Dispatch::Stream(bridge::run_tool_call(engine, id, message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_parse_error() {
        let reply = decode(b"{not json").unwrap_err();
        assert_eq!(reply.error.as_ref().unwrap().code, PARSE_ERROR);
        assert_eq!(reply.id, Value::Null);
        assert!(reply.result.is_none());
    }

    #[test]
    fn test_decode_invalid_shape_echoes_id() {
        // Valid JSON, but missing the protocol marker
        let reply = decode(br#"{"id": 7, "method": "ping"}"#).unwrap_err();
        assert_eq!(reply.error.as_ref().unwrap().code, INVALID_REQUEST);
        assert_eq!(reply.id, json!(7));
    }

    #[test]
    fn test_decode_rejects_non_string_method() {
        let reply = decode(br#"{"jsonrpc": "2.0", "id": 1, "method": 42}"#).unwrap_err();
        assert_eq!(reply.error.as_ref().unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn test_decode_request_and_notification() {
        let request = decode(br#"{"jsonrpc": "2.0", "id": "a", "method": "ping"}"#).unwrap();
        assert_eq!(request.method, "ping");
        assert_eq!(request.id, Some(json!("a")));

        let notification = decode(br#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
            .unwrap();
        assert!(notification.id.is_none());
    }

    #[test]
    fn test_response_never_carries_both_fields() {
        let ok = serde_json::to_value(JsonRpcResponse::success(json!(1), json!({}))).unwrap();
        assert!(ok.get("result").is_some());
        assert!(ok.get("error").is_none());

        let err =
            serde_json::to_value(JsonRpcResponse::error(Value::Null, INTERNAL_ERROR, "boom"))
                .unwrap();
        assert!(err.get("result").is_none());
        assert!(err.get("error").is_some());
        // The id field is serialized as an explicit null
        assert_eq!(err.get("id"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_initialize_rejects_unknown_version() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let request = decode(
            br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
        )
        .unwrap();

        let dispatch = McpHandler::handle(&state, &sessions, None, request).await;
        match dispatch {
            Dispatch::Reply(reply) => {
                assert_eq!(reply.error.unwrap().code, INVALID_PARAMS);
            }
            _ => panic!("expected a plain reply"),
        }
        // No session may be created for a rejected initialize
        assert_eq!(sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_initialize_creates_session() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let request = decode(
            br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        )
        .unwrap();

        match McpHandler::handle(&state, &sessions, None, request).await {
            Dispatch::Initialized { reply, session_id } => {
                assert!(sessions.exists(&session_id).await);
                let result = reply.result.unwrap();
                assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
                assert_eq!(result["serverInfo"]["name"], "ember");
                assert!(result["instructions"].is_string());
            }
            _ => panic!("expected Initialized"),
        }
    }

    #[tokio::test]
    async fn test_methods_require_live_session() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let request = decode(br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).unwrap();

        match McpHandler::handle(&state, &sessions, Some("unknown"), request).await {
            Dispatch::SessionRequired(reply) => {
                assert_eq!(reply.error.unwrap().code, INVALID_REQUEST);
                assert_eq!(reply.id, json!(2));
            }
            _ => panic!("expected SessionRequired"),
        }
    }

    #[tokio::test]
    async fn test_ping_works_without_session() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let request = decode(br#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#).unwrap();

        match McpHandler::handle(&state, &sessions, None, request).await {
            Dispatch::Reply(reply) => assert_eq!(reply.result.unwrap(), json!({})),
            _ => panic!("expected a plain reply"),
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let sid = sessions.create().await;
        let request = decode(br#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#).unwrap();

        match McpHandler::handle(&state, &sessions, Some(&sid), request).await {
            Dispatch::Reply(reply) => {
                assert_eq!(reply.error.unwrap().code, METHOD_NOT_FOUND);
            }
            _ => panic!("expected a plain reply"),
        }
    }

    #[tokio::test]
    async fn test_tool_call_validation() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let sid = sessions.create().await;

        let unknown_tool = decode(
            br#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"other_tool","arguments":{"message":"hi"}}}"#,
        )
        .unwrap();
        match McpHandler::handle(&state, &sessions, Some(&sid), unknown_tool).await {
            Dispatch::Reply(reply) => assert_eq!(reply.error.unwrap().code, INVALID_PARAMS),
            _ => panic!("expected a plain reply"),
        }

        let empty_message = decode(
            br#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"talk_to_ember","arguments":{"message":"   "}}}"#,
        )
        .unwrap();
        match McpHandler::handle(&state, &sessions, Some(&sid), empty_message).await {
            Dispatch::Reply(reply) => assert_eq!(reply.error.unwrap().code, INVALID_PARAMS),
            _ => panic!("expected a plain reply"),
        }
    }

    #[tokio::test]
    async fn test_tool_call_with_no_engine_is_tool_level_failure() {
        let state = AppState::new();
        let sessions = McpSessionRegistry::new();
        let sid = sessions.create().await;
        let request = decode(
            br#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"talk_to_ember","arguments":{"message":"hello"}}}"#,
        )
        .unwrap();

        match McpHandler::handle(&state, &sessions, Some(&sid), request).await {
            Dispatch::Reply(reply) => {
                let result = reply.result.unwrap();
                assert_eq!(result["isError"], json!(true));
                let text = result["content"][0]["text"].as_str().unwrap();
                assert!(text.contains("not available"));
            }
            _ => panic!("expected a plain reply, not a stream"),
        }
    }
}
