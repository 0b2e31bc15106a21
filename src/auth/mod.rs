//! Session authentication.
//!
//! `CredentialCache` holds the one current session token of an interceptor
//! and serialises refreshes so that concurrent stale responses trigger a
//! single login exchange. `SessionCookieInterceptor` is the interceptor that
//! drives it.

use std::future::Future;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

pub mod session_cookie;

pub use session_cookie::SessionCookieInterceptor;

/// A session token and when it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub obtained_at: DateTime<Utc>,
    /// Bumped on every store; lets callers tell two identical tokens apart.
    pub generation: u64,
}

/// Result of `CredentialCache::refresh_if_stale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This caller ran the login and stored a new token.
    Refreshed(String),
    /// Another caller refreshed while this one waited; the stored token is
    /// newer than the one that was rejected.
    AlreadyRefreshed(String),
    /// The login exchange did not produce a token. Callers that queued
    /// behind a failed exchange get this too, without logging in again.
    Failed,
}

/// What the most recent login exchange produced.
#[derive(Debug, Default)]
struct LastRefresh {
    failed: bool,
}

/// Current session token plus a single-flight refresh gate.
#[derive(Debug, Default)]
pub struct CredentialCache {
    current: RwLock<Option<Credential>>,
    // Held for the duration of a login exchange
    refresh: tokio::sync::Mutex<LastRefresh>,
    // Number of finished login exchanges
    epoch: AtomicU64,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Credential> {
        self.current.read().ok().and_then(|g| g.clone())
    }

    pub fn token(&self) -> Option<String> {
        if let Ok(g) = self.current.read()
            && let Some(credential) = g.as_ref()
        {
            return Some(credential.token.clone());
        }
        None
    }

    /// Replace the current token. Storing the value already held is a no-op.
    pub fn store(&self, token: impl Into<String>) {
        let token = token.into();
        if let Ok(mut g) = self.current.write() {
            if g.as_ref().is_some_and(|c| c.token == token) {
                return;
            }
            let generation = g.as_ref().map_or(1, |c| c.generation + 1);
            *g = Some(Credential {
                token,
                obtained_at: Utc::now(),
                generation,
            });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut g) = self.current.write() {
            *g = None;
        }
    }

    /// Number of login exchanges that have finished, successful or not.
    pub fn refresh_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Refresh the token unless someone already replaced the one that was
    /// rejected.
    ///
    /// `rejected` is the token sent with the failed request (`None` if the
    /// request carried none). Callers queue on the gate; the first runs
    /// `login`, the rest observe its result without logging in again,
    /// whether it succeeded or failed.
    pub async fn refresh_if_stale<F, Fut>(&self, rejected: Option<&str>, login: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let observed = self.refresh_epoch();
        let mut last = self.refresh.lock().await;

        if let Some(current) = self.token()
            && Some(current.as_str()) != rejected
        {
            return RefreshOutcome::AlreadyRefreshed(current);
        }
        if self.refresh_epoch() != observed && last.failed {
            return RefreshOutcome::Failed;
        }

        let outcome = match login().await {
            Some(token) => {
                self.store(token.clone());
                RefreshOutcome::Refreshed(token)
            }
            None => RefreshOutcome::Failed,
        };
        last.failed = outcome == RefreshOutcome::Failed;
        self.epoch.fetch_add(1, Ordering::Release);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn store_bumps_generation_only_on_change() {
        let cache = CredentialCache::new();
        assert!(cache.current().is_none());

        cache.store("AuthSession=a");
        assert_eq!(cache.current().unwrap().generation, 1);
        cache.store("AuthSession=a");
        assert_eq!(cache.current().unwrap().generation, 1);
        cache.store("AuthSession=b");
        assert_eq!(cache.current().unwrap().generation, 2);
        assert_eq!(cache.token().as_deref(), Some("AuthSession=b"));

        cache.clear();
        assert!(cache.token().is_none());
    }

    #[tokio::test]
    async fn newer_token_is_reused_without_login() {
        let cache = CredentialCache::new();
        cache.store("AuthSession=new");
        let logins = AtomicUsize::new(0);

        let outcome = cache
            .refresh_if_stale(Some("AuthSession=old"), || async {
                logins.fetch_add(1, Ordering::SeqCst);
                Some("AuthSession=other".to_string())
            })
            .await;

        assert_eq!(
            outcome,
            RefreshOutcome::AlreadyRefreshed("AuthSession=new".into())
        );
        assert_eq!(logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_login_keeps_previous_state() {
        let cache = CredentialCache::new();
        let outcome = cache.refresh_if_stale(None, || async { None }).await;
        assert_eq!(outcome, RefreshOutcome::Failed);
        assert!(cache.token().is_none());
    }

    #[tokio::test]
    async fn failed_login_is_shared_with_queued_callers() {
        let cache = Arc::new(CredentialCache::new());
        let logins = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let logins = logins.clone();
                tokio::spawn(async move {
                    cache
                        .refresh_if_stale(None, || async move {
                            logins.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            None
                        })
                        .await
                })
            })
            .collect();

        let outcomes = futures::future::join_all(tasks).await;

        assert_eq!(logins.load(Ordering::SeqCst), 1);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, Ok(RefreshOutcome::Failed)))
        );
        assert_eq!(cache.refresh_epoch(), 1);
    }

    #[tokio::test]
    async fn later_caller_retries_after_failed_login() {
        let cache = CredentialCache::new();
        assert_eq!(
            cache.refresh_if_stale(None, || async { None }).await,
            RefreshOutcome::Failed
        );

        let outcome = cache
            .refresh_if_stale(None, || async { Some("AuthSession=ok".to_string()) })
            .await;

        assert_eq!(outcome, RefreshOutcome::Refreshed("AuthSession=ok".into()));
        assert_eq!(cache.refresh_epoch(), 2);
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_login() {
        let cache = Arc::new(CredentialCache::new());
        let logins = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let logins = logins.clone();
                tokio::spawn(async move {
                    cache
                        .refresh_if_stale(None, || async move {
                            logins.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Some("AuthSession=fresh".to_string())
                        })
                        .await
                })
            })
            .collect();

        let outcomes = futures::future::join_all(tasks).await;

        assert_eq!(logins.load(Ordering::SeqCst), 1);
        let refreshed = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(RefreshOutcome::Refreshed(_))))
            .count();
        assert_eq!(refreshed, 1);
        assert!(outcomes.iter().all(|o| o.is_ok()));
    }
}
