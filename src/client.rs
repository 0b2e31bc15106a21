//! Client facade
//!
//! `CouchClient` ties the pieces together: one shared `InterceptableSession`
//! (with the session-cookie interceptor first when credentials are
//! configured) and one `OperationQueue` that runs operations against it.

use std::sync::Arc;

use reqwest::Url;

use crate::auth::SessionCookieInterceptor;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::execution::http::{
    HttpInterceptor, HttpTransport, InterceptableSession, ReqwestTransport,
};
use crate::operation::{Completion, CouchOperation, Operation, OperationHandle, OperationQueue};

#[derive(Debug, Clone)]
pub struct CouchClient {
    root_url: Url,
    session: Arc<InterceptableSession>,
    queue: OperationQueue,
    cookie: Option<Arc<SessionCookieInterceptor>>,
}

impl CouchClient {
    /// Build a client with the default `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        CouchClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> CouchClientBuilder {
        CouchClientBuilder::new(config)
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    pub fn session(&self) -> &Arc<InterceptableSession> {
        &self.session
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// The session-cookie interceptor, when credentials were configured.
    pub fn cookie_interceptor(&self) -> Option<&Arc<SessionCookieInterceptor>> {
        self.cookie.as_ref()
    }

    /// Queue an operation.
    pub fn add<O: CouchOperation>(&self, operation: O) -> OperationHandle {
        self.queue
            .add(Operation::new(self.root_url.clone(), operation))
    }

    /// Queue an operation and call `callback` once it finishes.
    pub fn add_with_completion<O, F>(&self, operation: O, callback: F) -> OperationHandle
    where
        O: CouchOperation,
        F: FnOnce(&Completion) + Send + 'static,
    {
        self.queue.add(
            Operation::new(self.root_url.clone(), operation).with_completion(callback),
        )
    }

    /// Queue an operation and wait for it.
    pub async fn execute<O: CouchOperation>(&self, operation: O) -> Completion {
        self.add(operation).wait().await
    }
}

/// Builder for `CouchClient`.
pub struct CouchClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    login_transport: Option<Arc<dyn HttpTransport>>,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
}

impl CouchClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            login_transport: None,
            interceptors: Vec::new(),
        }
    }

    /// Use a custom transport instead of `ReqwestTransport`. Also carries
    /// login exchanges unless `login_transport` is set.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Transport for `/_session` login exchanges.
    pub fn login_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.login_transport = Some(transport);
        self
    }

    /// Register an interceptor. Runs after the session-cookie interceptor,
    /// in registration order.
    pub fn interceptor(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Result<CouchClient> {
        let ClientConfig {
            url,
            credentials,
            http,
            session,
            max_concurrent_operations,
        } = self.config;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&http)?),
        };
        let login_transport = self.login_transport.unwrap_or_else(|| transport.clone());

        let cookie = credentials
            .map(|credentials| Arc::new(SessionCookieInterceptor::new(credentials, login_transport)));

        let mut interceptors: Vec<Arc<dyn HttpInterceptor>> = Vec::new();
        if let Some(cookie) = &cookie {
            interceptors.push(cookie.clone());
        }
        interceptors.extend(self.interceptors);

        tracing::debug!(
            target: "couchline::session",
            url = %url,
            interceptors = interceptors.len(),
            cookie_auth = cookie.is_some(),
            "client created"
        );

        let session = Arc::new(InterceptableSession::new(transport, interceptors, session));
        let queue = OperationQueue::new(session.clone(), max_concurrent_operations);

        Ok(CouchClient {
            root_url: url,
            session,
            queue,
            cookie,
        })
    }
}
