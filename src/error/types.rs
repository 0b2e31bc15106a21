//! Core error types.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CouchError>;

/// Errors surfaced by the request pipeline and the operations riding on it.
///
/// The type is `Clone` so a single outcome can be handed to a completion
/// callback and to every task waiting on the same operation.
#[derive(Error, Debug, Clone)]
pub enum CouchError {
    /// The operation's own preconditions were not met. No request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connectivity, TLS or DNS failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The interceptor chain kept asking for a retry until the cycle bound
    /// was reached.
    #[error("authentication refresh exhausted after {attempts} attempts (last status {status})")]
    AuthRefreshExhausted { attempts: u32, status: u16 },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {}", .body.as_deref().unwrap_or("<no body>"))]
    Http { status: u16, body: Option<String> },

    /// The server answered but the body was not the JSON we expected.
    #[error("unexpected JSON format (status {status}): {}", .body.as_deref().unwrap_or("<no body>"))]
    UnexpectedJson { status: u16, body: Option<String> },

    /// Request payload could not be serialised.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A URL could not be built from the configured root and the operation path.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid client, session or transport configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a `CouchError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Network,
    Authentication,
    Client,
    Server,
    Parsing,
    Configuration,
    Internal,
}

impl CouchError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Build an HTTP status error.
    pub fn http(status: u16, body: Option<String>) -> Self {
        Self::Http { status, body }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. }
            | Self::UnexpectedJson { status, .. }
            | Self::AuthRefreshExhausted { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the credential (401/403), either once or
    /// after the refresh bound was reached.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::AuthRefreshExhausted { .. } => true,
            Self::Http { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Transport(_) => ErrorCategory::Network,
            Self::AuthRefreshExhausted { .. } => ErrorCategory::Authentication,
            Self::Http { status, .. } if matches!(status, 401 | 403) => {
                ErrorCategory::Authentication
            }
            Self::Http { status, .. } if *status >= 500 => ErrorCategory::Server,
            Self::Http { .. } => ErrorCategory::Client,
            Self::UnexpectedJson { .. } | Self::Serialization(_) => ErrorCategory::Parsing,
            Self::InvalidUrl(_) | Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}
