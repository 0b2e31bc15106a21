//! HTTP Interceptor interfaces
//!
//! Interceptors are registered on an `InterceptableSession` and run in
//! registration order twice per chain cycle: once over the outgoing request
//! and once over the received response. The response phase returns an
//! `InterceptAction`; a single `Retry` makes the session discard the
//! response and start the next cycle from the first interceptor.

use async_trait::async_trait;

use crate::execution::http::request::{HttpRequest, HttpResponse};

/// Carrier for one cycle of the chain.
#[derive(Debug, Clone)]
pub struct InterceptorContext {
    /// Identifier shared by every cycle of one logical request.
    pub request_id: String,
    /// 1-based cycle number.
    pub attempt: u32,
    /// The request that will be sent. Interceptors may rewrite it.
    pub request: HttpRequest,
    /// The response, present only during the response phase.
    pub response: Option<HttpResponse>,
}

impl InterceptorContext {
    pub fn new(request_id: impl Into<String>, attempt: u32, request: HttpRequest) -> Self {
        Self {
            request_id: request_id.into(),
            attempt,
            request,
            response: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// Decision taken by an interceptor in the response phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterceptAction {
    /// Keep the response.
    #[default]
    Continue,
    /// Discard the response and run the whole chain again.
    Retry,
}

/// HTTP interceptor trait
///
/// Both hooks default to pass-through, so an implementation only overrides
/// the phase it cares about.
#[async_trait]
pub trait HttpInterceptor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "interceptor"
    }

    /// Request phase. May rewrite `ctx.request` in place.
    async fn intercept_request(&self, _ctx: &mut InterceptorContext) {}

    /// Response phase. `ctx.response` is always `Some` here.
    async fn intercept_response(&self, _ctx: &mut InterceptorContext) -> InterceptAction {
        InterceptAction::Continue
    }
}

/// An interceptor that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThroughInterceptor;

#[async_trait]
impl HttpInterceptor for PassThroughInterceptor {
    fn name(&self) -> &str {
        "pass_through"
    }
}

/// A simple logging interceptor backed by `tracing` (no bodies, no cookies).
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl HttpInterceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    async fn intercept_request(&self, ctx: &mut InterceptorContext) {
        tracing::debug!(
            target: "couchline::http",
            request_id = %ctx.request_id,
            attempt = ctx.attempt,
            method = %ctx.request.method,
            path = %ctx.request.url.path(),
            "sending request"
        );
    }

    async fn intercept_response(&self, ctx: &mut InterceptorContext) -> InterceptAction {
        tracing::debug!(
            target: "couchline::http",
            request_id = %ctx.request_id,
            attempt = ctx.attempt,
            status = ?ctx.status(),
            "response received"
        );
        InterceptAction::Continue
    }
}
