//! Request executor
//!
//! Bridges one operation to the interceptable session and back:
//! build the request, check cancellation, execute, check cancellation
//! again, hand the outcome to the operation and finish it.

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;

use crate::error::{CouchError, Result};
use crate::execution::http::{HttpRequest, InterceptableSession};
use crate::operation::{Completion, CouchOperation, Operation};

/// Build the request an operation describes.
///
/// The endpoint replaces the root URL's path. Query items already on the
/// root URL come first, followed by the operation's parameters.
/// `Content-Type` is only set when there is a body.
pub fn build_request<O: CouchOperation + ?Sized>(root_url: &Url, operation: &O) -> Result<HttpRequest> {
    if root_url.cannot_be_a_base() {
        return Err(CouchError::InvalidUrl(format!(
            "{root_url} cannot be used as a root URL"
        )));
    }

    let endpoint = operation.endpoint();
    let mut url = root_url.clone();
    if endpoint.starts_with('/') {
        url.set_path(&endpoint);
    } else {
        url.set_path(&format!("/{endpoint}"));
    }

    let root_query: Vec<(String, String)> = root_url.query_pairs().into_owned().collect();
    let parameters = operation.parameters();
    url.set_query(None);
    if !root_query.is_empty() || !parameters.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(root_query)
            .extend_pairs(parameters);
    }

    let mut request = HttpRequest::new(operation.method(), url);
    if let Some(body) = operation.body() {
        request.set_header(CONTENT_TYPE, operation.content_type())?;
        request.body = Some(body);
    }
    Ok(request)
}

/// Runs one operation's exchange. Consumed by `run`, so it cannot be
/// re-entered for the same operation.
#[derive(Debug)]
pub struct RequestExecutor<'a> {
    session: &'a InterceptableSession,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(session: &'a InterceptableSession) -> Self {
        Self { session }
    }

    /// Execute `operation` and finish it. Every path ends in exactly one
    /// `finish`.
    pub async fn run<O: CouchOperation>(self, operation: &mut Operation<O>) {
        let id = operation.id();

        let request = match build_request(operation.root_url(), operation.inner()) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(target: "couchline::executor", id = %id, error = %error, "could not build request");
                operation.inner_mut().process_response(Err(error.clone()));
                operation.finish(Completion::Failed(error));
                return;
            }
        };

        if operation.is_cancelled() {
            tracing::debug!(target: "couchline::executor", id = %id, "cancelled before dispatch");
            operation.finish(Completion::Cancelled);
            return;
        }

        tracing::debug!(
            target: "couchline::executor",
            id = %id,
            method = %request.method,
            path = %request.url.path(),
            "dispatching request"
        );
        let result = self.session.execute(request).await;

        if operation.is_cancelled() {
            // The exchange was already in flight; the operation decides what
            // to do with the result.
            tracing::debug!(target: "couchline::executor", id = %id, "cancelled during exchange, delivering result");
        }

        let completion = Completion::from_result(&result);
        operation.inner_mut().process_response(result);
        operation.finish(completion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::http::{HttpResponse, HttpTransport};
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Describe {
        endpoint: &'static str,
        method: Method,
        parameters: Vec<(String, String)>,
        body: Option<Bytes>,
    }

    impl Describe {
        fn get(endpoint: &'static str) -> Self {
            Self {
                endpoint,
                method: Method::GET,
                parameters: Vec::new(),
                body: None,
            }
        }
    }

    impl CouchOperation for Describe {
        fn endpoint(&self) -> String {
            self.endpoint.into()
        }
        fn method(&self) -> Method {
            self.method.clone()
        }
        fn parameters(&self) -> Vec<(String, String)> {
            self.parameters.clone()
        }
        fn body(&self) -> Option<Bytes> {
            self.body.clone()
        }
    }

    #[test]
    fn endpoint_replaces_root_path_and_keeps_root_query_first() {
        let root = Url::parse("https://acct.cloudant.com/ignored?tenant=a").unwrap();
        let mut op = Describe::get("/db/_all_docs");
        op.parameters = vec![("include_docs".into(), "true".into())];

        let request = build_request(&root, &op).unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://acct.cloudant.com/db/_all_docs?tenant=a&include_docs=true"
        );
        assert!(request.headers.get(CONTENT_TYPE).is_none());
        assert!(request.body.is_none());
    }

    #[test]
    fn body_sets_content_type() {
        let root = Url::parse("http://localhost:5984").unwrap();
        let op = Describe {
            method: Method::PUT,
            body: Some(Bytes::from_static(b"{\"a\":1}")),
            ..Describe::get("db/doc")
        };

        let request = build_request(&root, &op).unwrap();

        assert_eq!(request.url.as_str(), "http://localhost:5984/db/doc");
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.header(&CONTENT_TYPE), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn non_base_root_is_invalid() {
        let root = Url::parse("mailto:admin@example.com").unwrap();
        let err = build_request(&root, &Describe::get("/db")).unwrap_err();
        assert!(matches!(err, CouchError::InvalidUrl(_)));
    }

    struct CancelOnSend {
        calls: AtomicUsize,
        cancel: Mutex<Option<crate::operation::OperationHandle>>,
    }

    #[async_trait]
    impl HttpTransport for CancelOnSend {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.cancel.lock().unwrap().as_ref() {
                handle.cancel();
            }
            Ok(HttpResponse::new(201, r#"{"ok":true}"#))
        }
    }

    struct Recording {
        results: Arc<Mutex<Vec<u16>>>,
    }

    impl CouchOperation for Recording {
        fn endpoint(&self) -> String {
            "/db/doc".into()
        }
        fn process_response(&mut self, result: Result<HttpResponse>) {
            if let Ok(response) = result {
                self.results.lock().unwrap().push(response.status);
            }
        }
    }

    #[tokio::test]
    async fn result_is_delivered_when_cancelled_mid_exchange() {
        let transport = Arc::new(CancelOnSend {
            calls: AtomicUsize::new(0),
            cancel: Mutex::new(None),
        });
        let session = InterceptableSession::builder(transport.clone()).build();
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut op = Operation::new(
            Url::parse("http://localhost:5984").unwrap(),
            Recording {
                results: results.clone(),
            },
        );
        *transport.cancel.lock().unwrap() = Some(op.handle());

        RequestExecutor::new(&session).run(&mut op).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(op.is_cancelled());
        assert_eq!(results.lock().unwrap().as_slice(), &[201]);
        assert!(op.state().is_finished());
    }

    #[tokio::test]
    async fn cancelled_operation_is_finished_without_a_request() {
        let transport = Arc::new(CancelOnSend {
            calls: AtomicUsize::new(0),
            cancel: Mutex::new(None),
        });
        let session = InterceptableSession::builder(transport.clone()).build();
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut op = Operation::new(
            Url::parse("http://localhost:5984").unwrap(),
            Recording {
                results: results.clone(),
            },
        );
        op.cancel();

        RequestExecutor::new(&session).run(&mut op).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(results.lock().unwrap().is_empty());
        assert!(matches!(
            op.state(),
            crate::operation::OperationState::Finished(Completion::Cancelled)
        ));
    }
}
