//! Configuration module for the SCIM gateway.
//!
//! The gateway is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Secrets such as the
//! Basic auth password are expected to arrive that way, already decrypted by
//! whatever launches the gateway.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8880
//! localhost_only = true
//!
//! [auth]
//! username = "gwadmin"
//! password = "${SCIMGATEWAY_PASSWORD}"
//!
//! [adapter]
//! name = "loki"
//! attributes = ["userName", "name.givenName", "emails.[].type=work"]
//! ```

mod adapter;
mod auth;
mod observability;
mod server;

use std::path::Path;

pub use adapter::*;
pub use auth::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration.
///
/// `[server]` and `[auth]` must be present; the remaining sections have
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP(S) listener configuration.
    pub server: ServerConfig,

    /// Basic authentication credentials.
    pub auth: AuthConfig,

    /// Backend adapter selection and attribute whitelist.
    #[serde(default)]
    pub adapter: AdapterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables are an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        // Feature-gated sections are checked on the raw tree so the user gets an
        // actionable message instead of a runtime surprise.
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        let mut config: GatewayConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.adapter.validate()?;
        Ok(())
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let tls_configured = raw
        .get("server")
        .and_then(|v| v.get("tls"))
        .is_some();

    if tls_configured && !cfg!(feature = "tls") {
        return Err(ConfigError::Validation(
            "server.tls requires the 'tls' feature, which is not compiled in this build.\n\
             Rebuild with: cargo build --features tls"
                .into(),
        ));
    }
    Ok(())
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = env_var_pattern();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };
            if comment_pos.is_some_and(|pos| whole.start() >= pos) {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern compiles"))
}
