//! MCP (Model Context Protocol) Streamable HTTP support.
//!
//! This module implements the MCP 2025-03-26 Streamable HTTP transport,
//! exposing Ember's single `talk_to_ember` tool to AI assistants over a
//! standard HTTP endpoint with SSE streaming for tool-call output.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC requests (returns JSON or SSE)
//! - `DELETE /mcp` - Terminate a session
//!
//! ## Session Management
//!
//! Sessions are identified by the `Mcp-Session-Id` header, assigned
//! during initialization and required for all methods other than
//! `initialize`, `ping` and `notifications/initialized`.

pub mod bridge;
pub mod handler;
pub mod session;

pub use handler::{Dispatch, JsonRpcRequest, JsonRpcResponse, McpHandler};
pub use session::McpSessionRegistry;
