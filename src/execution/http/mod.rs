//! HTTP Utilities
//!
//! This module contains the HTTP layer of the pipeline:
//! - Request and response descriptors
//! - Transport abstraction and the `reqwest` transport
//! - HTTP interceptors
//! - The interceptable session that drives the chain

pub mod interceptor;
pub mod request;
pub mod session;
pub mod transport;

// Re-export main types
pub use interceptor::*;
pub use request::*;
pub use session::*;
pub use transport::*;
