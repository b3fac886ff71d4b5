//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    auth: AuthSection,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AuthSection {
    /// Bearer token required on every MCP request
    token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_port() -> u16 {
    ember_types::DEFAULT_PORT
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Bearer token for the MCP endpoint (if unset, authentication is disabled)
    pub auth_token: Option<String>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `.ember.toml` in current directory
    /// 2. `config.toml` in user config directory (~/.config/ember/ on Linux)
    pub fn from_figment(port: Option<u16>, auth_token: Option<String>) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir().ok().map(|d| d.join(".ember.toml"));
        let user_config = directories::ProjectDirs::from("", "", "ember")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // Priority: defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile {
            server: ServerConfig::default(),
            auth: AuthSection::default(),
            logging: LoggingConfig::default(),
        }));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(
            Env::prefixed("EMBER_")
                .map(|key| key.as_str().replace("__", ".").into())
                .split("_"),
        );

        if let Some(p) = port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref token) = auth_token {
            figment = figment.merge(Serialized::default("auth.token", token));
        }

        let config_file: ConfigFile = figment.extract()?;

        Ok(Self {
            port: config_file.server.port,
            auth_token: config_file.auth.token,
            log_level: config_file.logging.log_level,
        })
    }

    /// Load configuration from environment variables only (legacy support).
    ///
    /// This method is primarily for backward compatibility and tests.
    /// The binary uses `Config::from_figment()` with parsed arguments.
    pub fn from_env() -> Self {
        let port = env::var("EMBER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(ember_types::DEFAULT_PORT);

        Self {
            port,
            auth_token: env::var("EMBER_AUTH_TOKEN").ok(),
            log_level: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
