//! Ember bridge library.
//!
//! This module exposes the application builder for use in tests and for
//! sidecars embedding the bridge in a larger process.

use axum::http::{header, HeaderName, Method};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod mcp;
pub mod state;

use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub async fn create_app() -> Router {
    create_app_with_state(AppState::new()).await
}

/// Create the Axum application router with a given state.
pub async fn create_app_with_state(state: AppState) -> Router {
    create_app_with_state_and_auth(state, auth::AuthConfig::from_env()).await
}

/// Create the Axum application router with a given state and auth configuration.
pub async fn create_app_with_state_and_auth(
    state: AppState,
    auth_config: auth::AuthConfig,
) -> Router {
    let auth_config = Arc::new(auth_config);

    if auth_config.enabled {
        tracing::info!("Authentication enabled");
    } else {
        tracing::warn!("Authentication disabled - the MCP endpoint is public!");
    }

    // Session registry shared by every in-flight request
    let sessions = mcp::McpSessionRegistry::new();

    let mcp_router = Router::new()
        .route(
            "/mcp",
            post(api::mcp::mcp_post)
                .delete(api::mcp::mcp_delete)
                .fallback(api::mcp::mcp_method_not_allowed),
        )
        .layer(Extension(auth_config))
        .layer(Extension(sessions));

    Router::new()
        .route("/health", get(health))
        .merge(mcp_router)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    HeaderName::from_static("mcp-session-id"),
                ])
                .expose_headers([HeaderName::from_static("mcp-session-id")])
                .allow_origin(Any),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
