//! robots-warden: robots.txt enforcement for HTTP clients
//!
//! This crate wraps an HTTP client so that every outgoing request honours the
//! robots.txt of its host: disallowed paths are refused before they reach the
//! network, and crawl-delays are enforced per host and user agent.

pub mod client;
pub mod config;
pub mod robots;
pub mod url;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for robots-warden operations
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Errors returned by the robots-aware client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Access to {path} denied by robots.txt (clause: {clause}) for user agent {user_agent}")]
    Denied {
        path: String,
        user_agent: String,
        clause: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// HTTP status equivalent of the error, if any
    ///
    /// A robots.txt denial reads as `403 Forbidden`.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Denied { .. } => Some(StatusCode::FORBIDDEN),
            ClientError::Transport(e) => e.status(),
            ClientError::InvalidUrl(_) => None,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, ClientError::Denied { .. })
    }
}

/// Result type alias for robots-warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

// Re-export commonly used types
pub use client::{RobotsClient, Transport};
pub use config::Config;
pub use robots::{Admission, Grant, ParsedRobots, RobotsCache, Ruleset};
pub use url::{HostKey, HostTarget};

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> ClientError {
        ClientError::Denied {
            path: "/private".to_string(),
            user_agent: "bot".to_string(),
            clause: "Disallow: /private".to_string(),
        }
    }

    #[test]
    fn test_denied_message() {
        assert_eq!(
            denied().to_string(),
            "Access to /private denied by robots.txt (clause: Disallow: /private) for user agent bot"
        );
    }

    #[test]
    fn test_denied_status() {
        assert_eq!(denied().status(), Some(StatusCode::FORBIDDEN));
        assert!(denied().is_denied());
    }

    #[test]
    fn test_invalid_url_has_no_status() {
        let error = ClientError::InvalidUrl("nope".to_string());
        assert_eq!(error.status(), None);
        assert!(!error.is_denied());
    }

    #[test]
    fn test_warden_error_from_config_error() {
        let error: WardenError = ConfigError::Validation("capacity".to_string()).into();
        assert!(matches!(error, WardenError::Config(ConfigError::Validation(_))));
        assert_eq!(
            error.to_string(),
            "Configuration error: Validation error: capacity"
        );
    }

    #[test]
    fn test_warden_error_from_url_parse_error() {
        let error: WardenError = ::url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(error, WardenError::UrlParse(_)));
    }
}
