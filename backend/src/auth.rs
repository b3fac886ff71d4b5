//! Bearer token authentication for the MCP endpoint.
//!
//! The guard runs before any JSON-RPC decoding: a failed check yields a
//! plain HTTP 401, never a JSON-RPC error envelope.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

/// Authentication configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Bearer token required on every MCP request (from EMBER_AUTH_TOKEN)
    pub token: Option<String>,
    /// Whether authentication is enabled
    pub enabled: bool,
}

impl AuthConfig {
    /// Build a config from an explicit token. Authentication is enabled
    /// if and only if a token is configured.
    pub fn new(token: Option<String>) -> Self {
        let enabled = token.is_some();
        Self { token, enabled }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("EMBER_AUTH_TOKEN").ok())
    }

    /// Verify a presented token against the configured one.
    ///
    /// The comparison runs in time independent of where the first
    /// mismatching byte occurs, so response timing leaks nothing about
    /// the token contents.
    pub fn verify_token(&self, provided: &str) -> bool {
        let Some(expected) = &self.token else {
            return false;
        };
        let provided = provided.as_bytes();
        let expected = expected.as_bytes();
        if provided.len() != expected.len() {
            return false;
        }
        provided.ct_eq(expected).into()
    }

    /// Check the `Authorization: Bearer <token>` header of a request.
    ///
    /// Allows everything when authentication is disabled; otherwise the
    /// header must be present, carry the bearer scheme, and match.
    pub fn verify_bearer(&self, headers: &HeaderMap) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(provided) = value.strip_prefix("Bearer ") else {
            return false;
        };
        self.verify_token(provided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(token: &str) -> AuthConfig {
        AuthConfig::new(Some(token.to_string()))
    }

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_verify_token() {
        let config = config("secret-token");
        assert!(config.verify_token("secret-token"));
        assert!(!config.verify_token("secret-tokex"));
        // Length mismatch is rejected before the byte comparison
        assert!(!config.verify_token("secret"));
        assert!(!config.verify_token(""));
    }

    #[test]
    fn test_verify_bearer_header() {
        let config = config("secret-token");
        assert!(config.verify_bearer(&headers_with_auth("Bearer secret-token")));
        assert!(!config.verify_bearer(&headers_with_auth("Bearer wrong-token!")));
        // Missing scheme prefix
        assert!(!config.verify_bearer(&headers_with_auth("secret-token")));
        // Wrong scheme
        assert!(!config.verify_bearer(&headers_with_auth("Basic secret-token")));
        // Missing header entirely
        assert!(!config.verify_bearer(&HeaderMap::new()));
    }

    #[test]
    fn test_auth_disabled_allows_everything() {
        let config = AuthConfig::new(None);
        assert!(!config.enabled);
        assert!(config.verify_bearer(&HeaderMap::new()));
    }

    #[test]
    fn test_no_token_rejects_all_tokens() {
        let config = AuthConfig::new(None);
        assert!(!config.verify_token("anything"));
    }
}
