//! Default Configuration Values
//!
//! This module centralizes all default values used throughout the crate.

use std::time::Duration;

/// HTTP client default configurations
pub mod http {
    use super::*;

    /// Default request timeout for HTTP requests
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default connection timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default User-Agent string for HTTP requests
    pub const USER_AGENT: &str = concat!("couchline/", env!("CARGO_PKG_VERSION"));

    /// Content type used when an operation does not override it
    pub const JSON_CONTENT_TYPE: &str = "application/json";
}

/// Interceptable session defaults
pub mod session {
    /// Upper bound on chain cycles for one logical request.
    ///
    /// Every cycle ends in exactly one transport call, so this is also the
    /// maximum number of transport calls a single request can cause.
    pub const MAX_ATTEMPTS: u32 = 10;
}

/// Session-cookie authentication defaults
pub mod cookie {
    use super::*;

    /// Path of the session endpoint, relative to the server origin
    pub const LOGIN_PATH: &str = "/_session";

    /// Name of the cookie the server issues on login
    pub const SESSION_COOKIE_NAME: &str = "AuthSession";

    /// Content type of the login body
    pub const LOGIN_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

    /// How long a login exchange may take before it is abandoned
    pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(600);
}

/// 429 back-off defaults
pub mod back_off {
    use super::*;

    /// Number of times a request is replayed after `429 Too Many Requests`
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay before the first replay; doubled for every further replay
    pub const INITIAL_DELAY: Duration = Duration::from_millis(250);

    /// Ceiling for a single back-off delay
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    /// Growth factor between consecutive delays
    pub const MULTIPLIER: f64 = 2.0;
}

/// Operation scheduler defaults
pub mod queue {
    /// Number of operations allowed to execute at the same time
    pub const MAX_CONCURRENT_OPERATIONS: usize = 4;
}
