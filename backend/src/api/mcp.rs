//! MCP Streamable HTTP endpoint handlers.
//!
//! Thin transport adapter: converts HTTP requests into dispatcher calls
//! and dispatcher outcomes into HTTP responses.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC requests (returns JSON or SSE)
//! - `DELETE /mcp` - Terminate a session
//! - any other verb - 405

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::auth::AuthConfig;
use crate::mcp::{handler, Dispatch, JsonRpcResponse, McpHandler, McpSessionRegistry};
use crate::state::AppState;

/// Header name for the MCP session ID.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Extract the session ID from request headers.
fn get_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Build an `application/json` response carrying one JSON-RPC envelope.
fn rpc_json(status: StatusCode, reply: &JsonRpcResponse) -> Response {
    let body = serde_json::to_string(reply).unwrap_or_default();
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

/// POST /mcp - Handle JSON-RPC requests.
///
/// Returns `application/json` for single-envelope outcomes and
/// `text/event-stream` for a streamed `tools/call`. The `Mcp-Session-Id`
/// header is assigned on initialize and required for subsequent methods.
pub async fn mcp_post(
    State(state): State<AppState>,
    Extension(sessions): Extension<McpSessionRegistry>,
    Extension(auth_config): Extension<Arc<AuthConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !auth_config.verify_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    // Parse failures stay inside JSON-RPC: HTTP 200 with an error
    // envelope, which is why the body is taken as raw bytes here.
    let request = match handler::decode(&body) {
        Ok(request) => request,
        Err(reply) => return rpc_json(StatusCode::OK, &reply),
    };

    let session_id = get_session_id(&headers);
    debug!(
        "MCP POST: method={}, session={:?}",
        request.method, session_id
    );

    match McpHandler::handle(&state, &sessions, session_id.as_deref(), request).await {
        Dispatch::Reply(reply) => rpc_json(StatusCode::OK, &reply),
        Dispatch::SessionRequired(reply) => rpc_json(StatusCode::BAD_REQUEST, &reply),
        Dispatch::NotificationAck => StatusCode::ACCEPTED.into_response(),
        Dispatch::Initialized { reply, session_id } => {
            info!("MCP: new session initialized: {}", session_id);
            let mut response = rpc_json(StatusCode::OK, &reply);
            if let Ok(value) = HeaderValue::from_str(&session_id) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), value);
            }
            response
        }
        Dispatch::Stream(rx) => {
            // The bridge keeps writing on a detached task; the response
            // starts streaming before the exchange completes.
            let stream = ReceiverStream::new(rx)
                .map(|frame| Ok::<_, Infallible>(Event::default().data(frame)));
            Sse::new(stream)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
                .into_response()
        }
    }
}

/// DELETE /mcp - Terminate a session.
///
/// Removes the session named by `Mcp-Session-Id` if present. Always
/// succeeds, including for unknown or absent identifiers.
pub async fn mcp_delete(
    Extension(sessions): Extension<McpSessionRegistry>,
    Extension(auth_config): Extension<Arc<AuthConfig>>,
    headers: HeaderMap,
) -> Response {
    if !auth_config.verify_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if let Some(session_id) = get_session_id(&headers) {
        sessions.remove(&session_id).await;
    }
    StatusCode::OK.into_response()
}

/// Fallback for verbs other than POST/DELETE on the RPC endpoint.
///
/// The auth guard still runs first: credentials are checked on every
/// request before any other outcome.
pub async fn mcp_method_not_allowed(
    Extension(auth_config): Extension<Arc<AuthConfig>>,
    headers: HeaderMap,
) -> Response {
    if !auth_config.verify_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}
