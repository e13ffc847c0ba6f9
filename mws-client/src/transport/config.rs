//! HTTP transport configuration.
//!
//! Deserialized from the `[http]` table of the client configuration file.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{MwsError, Result};

/// HTTP transport configuration.
///
/// # Examples
///
/// ```toml
/// [http]
/// timeout_secs = 30
/// connect_timeout_secs = 10
/// pool_max_idle_per_host = 10
/// http_version = "http1"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Maximum idle connections per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// HTTP version preference.
    #[serde(default)]
    pub http_version: HttpVersion,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_max_idle(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            http_version: HttpVersion::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Validates configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`MwsError::Config`] if:
    /// - `timeout_secs` is outside 1-300 seconds
    /// - `connect_timeout_secs` is outside 1-60 seconds
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(MwsError::Config("timeout_secs must be between 1 and 300".to_owned()));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(MwsError::Config(
                "connect_timeout_secs must be between 1 and 60".to_owned(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(MwsError::Config("user_agent must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Returns timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns connect timeout as Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// HTTP version preference.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 only (requires prior knowledge or ALPN negotiation).
    Http2,
    /// Auto-negotiate (prefer HTTP/2, fall back to HTTP/1.1).
    #[default]
    Auto,
}

fn default_pool_max_idle() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("mws-client/{} (Language=Rust)", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.pool_max_idle_per_host, 100);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.http_version, HttpVersion::Auto);
        assert!(config.user_agent.starts_with("mws-client/"));
    }

    #[test]
    fn test_http_config_with_defaults() {
        let config: HttpConfig = toml::from_str("timeout_secs = 60").unwrap();
        assert_eq!(config.pool_max_idle_per_host, 100); // default
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.connect_timeout_secs, 10); // default
    }

    #[test]
    fn test_http_version_from_toml() {
        let config: HttpConfig = toml::from_str("http_version = \"http1\"").unwrap();
        assert_eq!(config.http_version, HttpVersion::Http1);

        let result: std::result::Result<HttpConfig, _> = toml::from_str("http_version = \"http3\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_http_config_validate_bounds() {
        assert!(HttpConfig::default().validate().is_ok());

        let config = HttpConfig { timeout_secs: 0, ..HttpConfig::default() };
        assert!(matches!(config.validate(), Err(MwsError::Config(_))));

        let config = HttpConfig { timeout_secs: 301, ..HttpConfig::default() };
        assert!(matches!(config.validate(), Err(MwsError::Config(_))));

        let config = HttpConfig { connect_timeout_secs: 61, ..HttpConfig::default() };
        assert!(matches!(config.validate(), Err(MwsError::Config(_))));

        let config = HttpConfig { timeout_secs: 300, connect_timeout_secs: 60, ..HttpConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_config_validate_empty_user_agent() {
        let config = HttpConfig { user_agent: "  ".to_owned(), ..HttpConfig::default() };
        assert!(config.validate().is_err());
    }
}
