//! Operation queue
//!
//! Spawns each added operation on the tokio runtime. A semaphore bounds how
//! many operations execute at the same time; the rest stay `Queued`.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::error::CouchError;
use crate::execution::http::InterceptableSession;
use crate::operation::{Completion, CouchOperation, Operation, OperationHandle};

#[derive(Debug, Clone)]
pub struct OperationQueue {
    session: Arc<InterceptableSession>,
    gate: Arc<Semaphore>,
    max_concurrent: usize,
}

impl OperationQueue {
    pub fn new(session: Arc<InterceptableSession>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            session,
            gate: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn session(&self) -> &Arc<InterceptableSession> {
        &self.session
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Schedule `operation`. Must be called from within a tokio runtime.
    pub fn add<O: CouchOperation>(&self, mut operation: Operation<O>) -> OperationHandle {
        let handle = operation.handle();
        let session = self.session.clone();
        let gate = self.gate.clone();
        let span = tracing::debug_span!(target: "couchline::queue", "operation", id = %operation.id());

        tracing::debug!(target: "couchline::queue", id = %operation.id(), "operation queued");

        tokio::spawn(
            async move {
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        operation.finish(Completion::Failed(CouchError::Internal(
                            "operation queue closed".into(),
                        )));
                        return;
                    }
                };
                operation.start(&session).await;
            }
            .instrument(span),
        );

        handle
    }

    /// Wait for every handle and return their completions in order.
    pub async fn wait_all(handles: &[OperationHandle]) -> Vec<Completion> {
        futures::future::join_all(handles.iter().map(OperationHandle::wait)).await
    }
}
