//! Shared test doubles: a recording transport and small response helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use couchline::{HttpRequest, HttpResponse, HttpTransport, Result};
use reqwest::header::{COOKIE, SET_COOKIE};

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// Transport double that records every request and answers through a
/// closure, optionally after a delay.
pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    pub fn with_delay<F>(delay: Duration, responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    /// Answer with `script` in order, then with `fallback` forever.
    pub fn scripted(script: Vec<Result<HttpResponse>>, fallback: HttpResponse) -> Arc<Self> {
        let script = Mutex::new(VecDeque::from(script));
        Self::new(move |_| {
            script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(fallback.clone()))
        })
    }

    /// Always answer with the same response.
    pub fn always(response: HttpResponse) -> Arc<Self> {
        Self::new(move |_| Ok(response.clone()))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&request)
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}

/// A successful `/_session` answer issuing `cookie`.
pub fn login_ok(cookie: &str) -> HttpResponse {
    response(200, r#"{"ok":true,"name":"admin","roles":["_admin"]}"#)
        .with_header(SET_COOKIE, &format!("{cookie}; Version=1; Path=/; HttpOnly"))
        .unwrap()
}

/// The `Cookie` header a request carried.
pub fn cookie_of(request: &HttpRequest) -> Option<String> {
    request.header(&COOKIE).map(str::to_string)
}
