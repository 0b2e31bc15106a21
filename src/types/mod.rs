//! Shared data types.

pub mod http;

pub use http::{HttpConfig, HttpConfigBuilder, HttpInfo};
