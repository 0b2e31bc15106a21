//! Retry module
//! - policy.rs: back-off policy applied to `429 Too Many Requests` responses

pub mod policy;

pub use policy::*;
