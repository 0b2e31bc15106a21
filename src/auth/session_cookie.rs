//! Session-cookie authentication interceptor.
//!
//! Attaches the stored `AuthSession` cookie to outgoing requests. When the
//! server answers 401 or 403 the interceptor logs in against `/_session`,
//! stores the new cookie and asks the session to replay the request.
//! Concurrent stale responses share one login through `CredentialCache`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Method, Url};
use secrecy::{ExposeSecret, SecretString};

use crate::auth::{CredentialCache, RefreshOutcome};
use crate::config::Credentials;
use crate::defaults::cookie;
use crate::execution::http::{
    HttpInterceptor, HttpRequest, HttpResponse, HttpTransport, InterceptAction,
    InterceptorContext,
};

/// How a login exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LoginOutcome {
    Token(String),
    /// Try again on the next stale response.
    Transient,
    /// Cookie authentication will not be attempted again.
    Rejected,
}

pub struct SessionCookieInterceptor {
    username: String,
    password: SecretString,
    login_transport: Arc<dyn HttpTransport>,
    cache: CredentialCache,
    enabled: AtomicBool,
    login_timeout: Duration,
}

impl std::fmt::Debug for SessionCookieInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookieInterceptor")
            .field("username", &self.username)
            .field("enabled", &self.is_enabled())
            .field("has_cookie", &self.cache.token().is_some())
            .finish()
    }
}

impl SessionCookieInterceptor {
    /// `login_transport` carries the `/_session` exchanges; it is kept apart
    /// from the session's transport so logins never re-enter the chain.
    pub fn new(credentials: Credentials, login_transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            username: credentials.username,
            password: credentials.password,
            login_transport,
            cache: CredentialCache::new(),
            enabled: AtomicBool::new(true),
            login_timeout: cookie::LOGIN_TIMEOUT,
        }
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// False once the server rejected the credentials for good.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// The cookie currently attached to requests, e.g. `AuthSession=abc`.
    pub fn cookie(&self) -> Option<String> {
        self.cache.token()
    }

    pub fn credential_cache(&self) -> &CredentialCache {
        &self.cache
    }

    fn login_request(&self, url: &Url) -> crate::error::Result<HttpRequest> {
        let mut login_url = url.clone();
        login_url.set_path(cookie::LOGIN_PATH);
        login_url.set_query(None);
        login_url.set_fragment(None);

        let body = format!(
            "name={}&password={}",
            urlencoding::encode(&self.username),
            urlencoding::encode(self.password.expose_secret())
        );
        HttpRequest::new(Method::POST, login_url)
            .with_body(body)
            .with_header(CONTENT_TYPE, cookie::LOGIN_CONTENT_TYPE)
    }

    /// Log in against the origin of `url`. Returns the new cookie on success.
    async fn start_session(&self, url: &Url) -> Option<String> {
        // A caller queued behind a rejected login must not try again.
        if !self.is_enabled() {
            return None;
        }
        let request = match self.login_request(url) {
            Ok(request) => request,
            Err(error) => {
                tracing::error!(target: "couchline::cookie", error = %error, "could not build login request");
                return None;
            }
        };

        tracing::debug!(target: "couchline::cookie", user = %self.username, "starting new session");

        let outcome = match tokio::time::timeout(
            self.login_timeout,
            self.login_transport.send(request),
        )
        .await
        {
            Err(_) => {
                tracing::warn!(
                    target: "couchline::cookie",
                    timeout_secs = self.login_timeout.as_secs(),
                    "login timed out"
                );
                LoginOutcome::Transient
            }
            Ok(Err(error)) => {
                tracing::warn!(target: "couchline::cookie", error = %error, "login request failed");
                LoginOutcome::Transient
            }
            Ok(Ok(response)) => classify_login_response(&response),
        };

        match outcome {
            LoginOutcome::Token(token) => {
                tracing::info!(target: "couchline::cookie", user = %self.username, "session cookie obtained");
                Some(token)
            }
            LoginOutcome::Transient => None,
            LoginOutcome::Rejected => {
                self.enabled.store(false, Ordering::Release);
                self.cache.clear();
                tracing::warn!(
                    target: "couchline::cookie",
                    user = %self.username,
                    "cookie authentication disabled for this client"
                );
                None
            }
        }
    }

    /// Keep a session cookie the server rolled over on a normal response.
    fn capture_renewed_cookie(&self, response: &HttpResponse) {
        if !self.is_enabled() {
            return;
        }
        if let Some(token) = session_cookie(response) {
            if self.cache.token().as_deref() != Some(token.as_str()) {
                tracing::debug!(target: "couchline::cookie", "session cookie renewed by server");
            }
            self.cache.store(token);
        }
    }
}

fn classify_login_response(response: &HttpResponse) -> LoginOutcome {
    match response.status {
        200..=299 => {
            let ok = serde_json::from_slice::<serde_json::Value>(&response.body)
                .ok()
                .and_then(|json| json.get("ok").and_then(serde_json::Value::as_bool))
                .unwrap_or(false);
            if !ok {
                tracing::warn!(target: "couchline::cookie", "login response did not contain ok:true");
                return LoginOutcome::Transient;
            }
            match first_set_cookie(response) {
                Some(token) => LoginOutcome::Token(token),
                None => {
                    tracing::warn!(target: "couchline::cookie", "login response carried no Set-Cookie header");
                    LoginOutcome::Transient
                }
            }
        }
        401 => {
            tracing::warn!(target: "couchline::cookie", "credentials are incorrect");
            LoginOutcome::Rejected
        }
        500..=599 => {
            tracing::warn!(target: "couchline::cookie", status = response.status, "login failed with server error");
            LoginOutcome::Transient
        }
        status => {
            tracing::warn!(target: "couchline::cookie", status, "login failed");
            LoginOutcome::Rejected
        }
    }
}

/// First `;` segment of the first `Set-Cookie` header.
fn first_set_cookie(response: &HttpResponse) -> Option<String> {
    response
        .headers
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The `AuthSession=...` pair among the response's `Set-Cookie` headers.
fn session_cookie(response: &HttpResponse) -> Option<String> {
    response
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(name, value)| name == cookie::SESSION_COOKIE_NAME && !value.is_empty())
        })
        .map(str::to_string)
}

#[async_trait]
impl HttpInterceptor for SessionCookieInterceptor {
    fn name(&self) -> &str {
        "session_cookie"
    }

    async fn intercept_request(&self, ctx: &mut InterceptorContext) {
        if !self.is_enabled() {
            // A request replayed from an earlier cycle may still carry one.
            ctx.request.headers.remove(COOKIE);
            return;
        }
        if let Some(token) = self.cache.token()
            && let Err(error) = ctx.request.set_header(COOKIE, &token)
        {
            tracing::warn!(target: "couchline::cookie", error = %error, "stored cookie is not a valid header value");
        }
    }

    async fn intercept_response(&self, ctx: &mut InterceptorContext) -> InterceptAction {
        let Some(response) = ctx.response.as_ref() else {
            return InterceptAction::Continue;
        };
        if response.is_success() {
            self.capture_renewed_cookie(response);
            return InterceptAction::Continue;
        }
        if !response.is_auth_failure() || !self.is_enabled() {
            return InterceptAction::Continue;
        }

        let status = response.status;
        let rejected = ctx.request.header(&COOKIE).map(str::to_owned);
        let url = ctx.request.url.clone();

        match self
            .cache
            .refresh_if_stale(rejected.as_deref(), || self.start_session(&url))
            .await
        {
            RefreshOutcome::Refreshed(_) => {
                tracing::debug!(
                    target: "couchline::cookie",
                    request_id = %ctx.request_id,
                    status,
                    "credential refreshed, retrying"
                );
                InterceptAction::Retry
            }
            RefreshOutcome::AlreadyRefreshed(_) => {
                tracing::debug!(
                    target: "couchline::cookie",
                    request_id = %ctx.request_id,
                    status,
                    "credential refreshed by a concurrent request, retrying"
                );
                InterceptAction::Retry
            }
            RefreshOutcome::Failed => InterceptAction::Continue,
        }
    }
}
