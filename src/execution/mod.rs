//! Request execution
//!
//! - `http`: request/response descriptors, the transport abstraction, the
//!   interceptor contract and the interceptable session driving the chain
//! - `executor`: bridges a queued operation to the session and back

pub mod executor;
pub mod http;

pub use executor::{RequestExecutor, build_request};
