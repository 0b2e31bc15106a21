//! couchline
//!
//! Interceptable, retryable request execution for CouchDB and Cloudant.
//!
//! - `execution::http`: transport abstraction, interceptor contract and the
//!   `InterceptableSession` that drives the chain
//! - `auth`: session-cookie authentication with single-flight refresh
//! - `execution::executor`: bridges one operation to the session
//! - `operation`: operation lifecycle, completion and scheduling
//! - `operations`: reference document and database operations
//! - `client`: the `CouchClient` facade
#![deny(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod defaults;
pub mod error;
pub mod execution;
pub mod operation;
pub mod operations;
pub mod retry;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use client::{CouchClient, CouchClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, Credentials, SessionConfig};
pub use error::{CouchError, ErrorCategory, Result};
pub use execution::http::{
    HttpInterceptor, HttpRequest, HttpResponse, HttpTransport, InterceptAction,
    InterceptableSession, InterceptorContext, ReqwestTransport,
};
pub use operation::{Completion, CouchOperation, Operation, OperationHandle, OperationState};
pub use types::HttpInfo;
