//! Interceptable session
//!
//! Drives one logical request through the interceptor chain:
//!
//! 1. Request phase: every interceptor, in registration order, may rewrite
//!    the outgoing request
//! 2. The final request goes to the transport
//! 3. Response phase: every interceptor, in the same order, inspects the
//!    response and may ask for a retry
//! 4. On retry the response is discarded and a new cycle starts from the
//!    first interceptor with the (possibly rewritten) request
//!
//! The number of cycles is bounded by `SessionConfig::max_attempts`. Running
//! out of cycles while interceptors still ask for a retry ends the request
//! with `CouchError::AuthRefreshExhausted`. A transport failure ends the
//! request immediately and skips the response phase for that cycle.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::{CouchError, Result};
use crate::execution::http::interceptor::{HttpInterceptor, InterceptAction, InterceptorContext};
use crate::execution::http::request::{HttpRequest, HttpResponse};
use crate::execution::http::transport::HttpTransport;

const TOO_MANY_REQUESTS: u16 = 429;

/// Outcome of one chain cycle.
#[derive(Debug)]
enum CycleOutcome {
    /// An interceptor asked for the whole chain to run again.
    Retry { request: HttpRequest, status: u16 },
    /// Rate limited; replay after the back-off delay.
    BackOff(HttpRequest),
    /// Final response for the caller.
    Done(HttpResponse),
}

/// Owns the interceptor chain and the transport. Shared by every operation
/// issued against the same client.
pub struct InterceptableSession {
    transport: Arc<dyn HttpTransport>,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
    config: SessionConfig,
}

impl std::fmt::Debug for InterceptableSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptableSession")
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl InterceptableSession {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        interceptors: Vec<Arc<dyn HttpInterceptor>>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            interceptors,
            config,
        }
    }

    pub fn builder(transport: Arc<dyn HttpTransport>) -> InterceptableSessionBuilder {
        InterceptableSessionBuilder::new(transport)
    }

    pub fn interceptors(&self) -> &[Arc<dyn HttpInterceptor>] {
        &self.interceptors
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run `request` through the chain until a final response is produced.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let max_attempts = self.config.effective_max_attempts();
        let mut request = request;
        let mut back_offs_used = 0u32;

        for attempt in 1..=max_attempts {
            let can_back_off = attempt < max_attempts
                && self
                    .config
                    .back_off
                    .as_ref()
                    .is_some_and(|policy| policy.allows(back_offs_used));

            match self
                .run_cycle(&request_id, attempt, request, can_back_off)
                .await?
            {
                CycleOutcome::Done(response) => return Ok(response),
                CycleOutcome::Retry {
                    request: next,
                    status,
                } => {
                    if attempt == max_attempts {
                        tracing::warn!(
                            target: "couchline::session",
                            request_id = %request_id,
                            attempts = attempt,
                            status,
                            "retry bound reached while interceptors still request a retry"
                        );
                        return Err(CouchError::AuthRefreshExhausted {
                            attempts: attempt,
                            status,
                        });
                    }
                    tracing::debug!(
                        target: "couchline::session",
                        request_id = %request_id,
                        attempt,
                        status,
                        "interceptor requested retry"
                    );
                    request = next;
                }
                CycleOutcome::BackOff(next) => {
                    let delay = self
                        .config
                        .back_off
                        .as_ref()
                        .map(|policy| policy.calculate_delay(back_offs_used))
                        .unwrap_or_default();
                    back_offs_used += 1;
                    tracing::debug!(
                        target: "couchline::session",
                        request_id = %request_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    request = next;
                }
            }
        }

        Err(CouchError::Internal(
            "interceptor chain finished without a response".into(),
        ))
    }

    async fn run_cycle(
        &self,
        request_id: &str,
        attempt: u32,
        request: HttpRequest,
        can_back_off: bool,
    ) -> Result<CycleOutcome> {
        let mut ctx = InterceptorContext::new(request_id, attempt, request);

        for interceptor in &self.interceptors {
            interceptor.intercept_request(&mut ctx).await;
        }

        let response = match self.transport.send(ctx.request.clone()).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(
                    target: "couchline::session",
                    request_id = %request_id,
                    attempt,
                    error = %error,
                    "transport failed"
                );
                return Err(error);
            }
        };
        let status = response.status;
        ctx.response = Some(response);

        let mut retry = false;
        for interceptor in &self.interceptors {
            if interceptor.intercept_response(&mut ctx).await == InterceptAction::Retry {
                retry = true;
            }
        }

        let InterceptorContext {
            request, response, ..
        } = ctx;

        if retry {
            return Ok(CycleOutcome::Retry { request, status });
        }
        if status == TOO_MANY_REQUESTS && can_back_off {
            return Ok(CycleOutcome::BackOff(request));
        }
        response
            .map(CycleOutcome::Done)
            .ok_or_else(|| CouchError::Internal("interceptor removed the response".into()))
    }
}

/// Builder for `InterceptableSession`. Insertion order is evaluation order.
pub struct InterceptableSessionBuilder {
    transport: Arc<dyn HttpTransport>,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
    config: SessionConfig,
}

impl InterceptableSessionBuilder {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            interceptors: Vec::new(),
            config: SessionConfig::default(),
        }
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn interceptors(mut self, interceptors: Vec<Arc<dyn HttpInterceptor>>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> InterceptableSession {
        InterceptableSession::new(self.transport, self.interceptors, self.config)
    }
}
