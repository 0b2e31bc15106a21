//! Conversions from the error types of the crates the pipeline is built on.

use super::CouchError;

impl From<reqwest::Error> for CouchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            CouchError::Configuration(err.to_string())
        } else {
            CouchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CouchError {
    fn from(err: serde_json::Error) -> Self {
        CouchError::Serialization(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for CouchError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        CouchError::Configuration(format!("invalid header value: {err}"))
    }
}

impl From<reqwest::header::InvalidHeaderName> for CouchError {
    fn from(err: reqwest::header::InvalidHeaderName) -> Self {
        CouchError::Configuration(format!("invalid header name: {err}"))
    }
}
