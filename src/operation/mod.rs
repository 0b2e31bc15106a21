//! Operations
//!
//! An operation is one logical remote call. A concrete operation only
//! describes its request (`CouchOperation`) and interprets the response;
//! `Operation` wraps it in the shared lifecycle and `OperationQueue`
//! schedules it against a session.

use bytes::Bytes;
use reqwest::Method;

use crate::defaults;
use crate::error::Result;
use crate::execution::http::HttpResponse;

pub mod lifecycle;
pub mod queue;
pub mod response;

pub use lifecycle::{Completion, CompletionCallback, Operation, OperationHandle, OperationState};
pub use queue::OperationQueue;
pub use response::{process_data_response, process_json_response};

/// Capabilities a concrete operation supplies to the engine.
///
/// Only `endpoint` is required. Everything else defaults to a bodiless `GET`
/// with no parameters that always validates and ignores its response.
pub trait CouchOperation: Send + 'static {
    /// Path of the request, relative to the server root (e.g. `/db/doc`).
    /// Path segments must already be percent-encoded.
    fn endpoint(&self) -> String;

    fn method(&self) -> Method {
        Method::GET
    }

    /// Query parameters appended after any the root URL already carries.
    fn parameters(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Request body; `None` sends no body and no `Content-Type`.
    fn body(&self) -> Option<Bytes> {
        None
    }

    fn content_type(&self) -> &str {
        defaults::http::JSON_CONTENT_TYPE
    }

    /// Check the operation's own preconditions. Errors are reported to the
    /// caller as `CouchError::Validation`.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Prepare the request body. Runs once, after validation succeeded.
    fn serialise(&mut self) -> Result<()> {
        Ok(())
    }

    /// Receive the outcome of the exchange: the final response (any status)
    /// or the error that prevented one. Called at most once.
    fn process_response(&mut self, _result: Result<HttpResponse>) {}
}
