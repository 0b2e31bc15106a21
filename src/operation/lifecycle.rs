//! Operation lifecycle
//!
//! `Queued -> Executing -> Finished`, with cancellation as an orthogonal
//! flag checked before dispatch and after the exchange. The finished state
//! is entered exactly once; it carries the `Completion` that is handed to
//! the completion callback and to every `OperationHandle::wait`.

use reqwest::Url;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{CouchError, Result};
use crate::execution::RequestExecutor;
use crate::execution::http::{HttpResponse, InterceptableSession};
use crate::operation::CouchOperation;
use crate::types::HttpInfo;
use crate::utils::CancelHandle;

/// How an operation ended.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The server answered with a 2xx status.
    Success(HttpInfo),
    /// Validation, transport, chain or HTTP-status failure.
    Failed(CouchError),
    /// Cancelled before a request was dispatched.
    Cancelled,
}

impl Completion {
    /// Classify the outcome of an exchange. Non-2xx statuses become
    /// `CouchError::Http` with the status preserved.
    pub fn from_result(result: &Result<HttpResponse>) -> Self {
        match result {
            Ok(response) if response.is_success() => Self::Success(response.info()),
            Ok(response) => Self::Failed(CouchError::Http {
                status: response.status,
                body: response.body_text(),
            }),
            Err(error) => Self::Failed(error.clone()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn error(&self) -> Option<&CouchError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success(info) => Some(info.status),
            Self::Failed(error) => error.status_code(),
            Self::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OperationState {
    Queued,
    Executing,
    Finished(Completion),
}

impl OperationState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Invoked once with the final `Completion`.
pub type CompletionCallback = Box<dyn FnOnce(&Completion) + Send>;

/// A concrete operation bound to a root URL and the shared lifecycle.
pub struct Operation<O: CouchOperation> {
    id: Uuid,
    inner: O,
    root_url: Url,
    state: watch::Sender<OperationState>,
    cancel: CancelHandle,
    on_complete: Option<CompletionCallback>,
    finished: bool,
}

impl<O: CouchOperation> std::fmt::Debug for Operation<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("endpoint", &self.inner.endpoint())
            .field("state", &*self.state.borrow())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<O: CouchOperation> Operation<O> {
    pub fn new(root_url: Url, inner: O) -> Self {
        let (state, _) = watch::channel(OperationState::Queued);
        Self {
            id: Uuid::new_v4(),
            inner,
            root_url,
            state,
            cancel: CancelHandle::new(),
            on_complete: None,
            finished: false,
        }
    }

    pub fn with_completion<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Completion) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut O {
        &mut self.inner
    }

    pub fn state(&self) -> OperationState {
        self.state.borrow().clone()
    }

    pub fn handle(&self) -> OperationHandle {
        OperationHandle {
            id: self.id,
            state: self.state.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Enter `Finished`. Returns `false` (and does nothing) if the operation
    /// already finished.
    pub fn finish(&mut self, completion: Completion) -> bool {
        if self.finished {
            tracing::warn!(
                target: "couchline::operation",
                id = %self.id,
                "operation finished twice; ignoring"
            );
            return false;
        }
        self.finished = true;

        tracing::debug!(
            target: "couchline::operation",
            id = %self.id,
            success = completion.is_success(),
            cancelled = completion.is_cancelled(),
            status = ?completion.status(),
            "operation finished"
        );

        if let Some(callback) = self.on_complete.take() {
            callback(&completion);
        }
        self.state.send_replace(OperationState::Finished(completion));
        true
    }

    /// Run the operation to completion against `session`.
    ///
    /// Cancellation is checked first, then the operation validates and
    /// serialises itself, and finally the executor performs the exchange.
    pub async fn start(mut self, session: &InterceptableSession) -> Completion {
        if self.is_cancelled() {
            self.finish(Completion::Cancelled);
            return self.completion();
        }

        self.state.send_replace(OperationState::Executing);

        if let Err(error) = self.inner.validate() {
            let error = match error {
                CouchError::Validation(_) => error,
                other => CouchError::Validation(other.to_string()),
            };
            tracing::debug!(
                target: "couchline::operation",
                id = %self.id,
                error = %error,
                "validation failed"
            );
            self.fail_before_dispatch(error);
            return self.completion();
        }

        if let Err(error) = self.inner.serialise() {
            self.fail_before_dispatch(error);
            return self.completion();
        }

        RequestExecutor::new(session).run(&mut self).await;
        self.completion()
    }

    fn fail_before_dispatch(&mut self, error: CouchError) {
        self.inner.process_response(Err(error.clone()));
        self.finish(Completion::Failed(error));
    }

    fn completion(&self) -> Completion {
        match &*self.state.borrow() {
            OperationState::Finished(completion) => completion.clone(),
            _ => Completion::Failed(CouchError::Internal(
                "operation returned without finishing".into(),
            )),
        }
    }
}

impl<O: CouchOperation> Drop for Operation<O> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Completion::Failed(CouchError::Internal(
                "operation dropped before it finished".into(),
            )));
        }
    }
}

/// Caller-side view of a queued operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    id: Uuid,
    state: watch::Receiver<OperationState>,
    cancel: CancelHandle,
}

impl OperationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> OperationState {
        self.state.borrow().clone()
    }

    /// Request cancellation. Honoured before dispatch; an exchange already
    /// in flight still completes and is delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the operation finishes.
    pub async fn wait(&self) -> Completion {
        let mut state = self.state.clone();
        loop {
            if let OperationState::Finished(completion) = &*state.borrow_and_update() {
                return completion.clone();
            }
            if state.changed().await.is_err() {
                return match &*state.borrow() {
                    OperationState::Finished(completion) => completion.clone(),
                    _ => Completion::Failed(CouchError::Internal(
                        "operation dropped before it finished".into(),
                    )),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::http::{HttpRequest, HttpTransport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    struct Fixed(u16, &'static str, AtomicUsize);

    #[async_trait]
    impl HttpTransport for Fixed {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse> {
            self.2.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse::new(self.0, self.1))
        }
    }

    #[derive(Default)]
    struct Probe {
        invalid: bool,
        responses: Arc<Mutex<Vec<Result<HttpResponse>>>>,
    }

    impl CouchOperation for Probe {
        fn endpoint(&self) -> String {
            "/db/doc".into()
        }

        fn validate(&self) -> Result<()> {
            if self.invalid {
                Err(CouchError::validation("doc id is required"))
            } else {
                Ok(())
            }
        }

        fn process_response(&mut self, result: Result<HttpResponse>) {
            self.responses.lock().unwrap().push(result);
        }
    }

    fn root() -> Url {
        Url::parse("http://localhost:5984").unwrap()
    }

    fn session(status: u16, body: &'static str) -> (Arc<Fixed>, InterceptableSession) {
        let transport = Arc::new(Fixed(status, body, AtomicUsize::new(0)));
        let session = InterceptableSession::builder(transport.clone()).build();
        (transport, session)
    }

    fn counting_callback(calls: &Arc<AtomicUsize>) -> impl FnOnce(&Completion) + Send + 'static {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    #[traced_test]
    fn finish_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut op = Operation::new(root(), Probe::default()).with_completion(counting_callback(&calls));

        assert!(op.finish(Completion::Cancelled));
        assert!(!op.finish(Completion::Failed(CouchError::Internal("again".into()))));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            op.state(),
            OperationState::Finished(Completion::Cancelled)
        ));
        drop(op);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(logs_contain("operation finished twice"));
    }

    #[tokio::test]
    async fn successful_exchange_reaches_hook_and_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Probe::default();
        let responses = probe.responses.clone();
        let (_, session) = session(200, r#"{"ok":true}"#);
        let op = Operation::new(root(), probe).with_completion(counting_callback(&calls));
        let handle = op.handle();
        assert!(matches!(handle.state(), OperationState::Queued));

        let completion = op.start(&session).await;

        assert!(completion.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let responses = responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        let response = responses[0].as_ref().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], br#"{"ok":true}"#);
        assert!(handle.wait().await.is_success());
    }

    #[tokio::test]
    async fn validation_failure_skips_the_transport() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Probe {
            invalid: true,
            ..Probe::default()
        };
        let responses = probe.responses.clone();
        let (transport, session) = session(200, "{}");

        let completion = Operation::new(root(), probe)
            .with_completion(counting_callback(&calls))
            .start(&session)
            .await;

        assert!(matches!(
            completion.error(),
            Some(CouchError::Validation(_))
        ));
        assert_eq!(transport.2.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            responses.lock().unwrap()[0],
            Err(CouchError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start_never_dispatches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Probe::default();
        let responses = probe.responses.clone();
        let (transport, session) = session(200, "{}");
        let op = Operation::new(root(), probe).with_completion(counting_callback(&calls));
        let handle = op.handle();

        handle.cancel();
        let completion = op.start(&session).await;

        assert!(completion.is_cancelled());
        assert!(handle.wait().await.is_cancelled());
        assert_eq!(transport.2.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_errors_are_classified_with_status() {
        let (_, session) = session(404, r#"{"error":"not_found"}"#);
        let completion = Operation::new(root(), Probe::default())
            .start(&session)
            .await;
        assert_eq!(completion.status(), Some(404));
        assert!(matches!(
            completion.error(),
            Some(CouchError::Http { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn dropping_an_unfinished_operation_completes_waiters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = Operation::new(root(), Probe::default()).with_completion(counting_callback(&calls));
        let handle = op.handle();

        drop(op);

        assert!(matches!(
            handle.wait().await.error(),
            Some(CouchError::Internal(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
