//! Error types for the edgesync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for edgesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the edgesync system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing domains, missing zone id, bad document shape)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No usable credential for a zone
    #[error("Credential error: {0}")]
    Credential(String),

    /// Template instantiation errors
    #[error("Template error: {0}")]
    Template(String),

    /// A settings key with no registered operation
    #[error("Unrecognized setting: {0}")]
    UnknownSetting(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message, including the provider's raw error payload
        message: String,
    },

    /// Resource (zone, ruleset, item) not found on the provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid input (malformed managed item, wrong value shape)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors (configuration file reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create an unrecognized setting error
    pub fn unknown_setting(key: impl Into<String>) -> Self {
        Self::UnknownSetting(key.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the configuration class
    ///
    /// Configuration errors are raised before any provider call and are
    /// never retried.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Credential(_) | Self::Template(_) | Self::Json(_) | Self::Io(_)
        )
    }

    /// Whether this error reports a missing remote resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::config("no domains").is_config());
        assert!(Error::credential("missing").is_config());
        assert!(!Error::provider("cloudflare", "boom").is_config());
        assert!(Error::not_found("ruleset").is_not_found());
        assert!(!Error::rate_limited("slow down").is_not_found());
    }

    #[test]
    fn test_unknown_setting_display() {
        let err = Error::unknown_setting("no_such_setting");
        assert_eq!(err.to_string(), "Unrecognized setting: no_such_setting");
        assert!(!err.is_config());
    }

    #[test]
    fn test_provider_error_display() {
        let err = Error::provider("cloudflare", "Failed to create item: 400 - bad");
        assert_eq!(
            err.to_string(),
            "Provider error (cloudflare): Failed to create item: 400 - bad"
        );
    }
}
