//! Error Handling Module
//!
//! This module provides the error type shared by every layer of the pipeline:
//! - Core error type (`CouchError`) and its `ErrorCategory`
//! - Conversions from the error types of the crates we sit on
//!
//! # Example
//!
//! ```rust,ignore
//! use couchline::error::{CouchError, ErrorCategory};
//!
//! let error = CouchError::http(404, Some("{\"error\":\"not_found\"}".into()));
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert_eq!(error.status_code(), Some(404));
//! ```

mod conversions;
pub mod types;

pub use types::*;
