//! HTTP transport abstraction.
//!
//! The pipeline never talks to the network itself. It hands the final,
//! post-interceptor request to an `HttpTransport` and awaits the response.
//! `ReqwestTransport` is the production implementation; tests plug in
//! scripted doubles to simulate failures and retries deterministically.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{CouchError, Result};
use crate::execution::http::request::{HttpRequest, HttpResponse};
use crate::types::HttpConfig;

/// Performs one network exchange.
///
/// Implementations report connectivity failures as `CouchError::Transport`
/// and must return every HTTP status, including 4xx and 5xx, as a response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client from `HttpConfig`.
    ///
    /// The client keeps no cookie jar; session cookies are owned by the
    /// session-cookie interceptor.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        let client = builder
            .default_headers(headers)
            .build()
            .map_err(|e| CouchError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| CouchError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| CouchError::Transport(format!("failed to read response body: {e}")))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
