//! Session refresh policy.
//!
//! [`SessionRefresher`] owns every decision about when and how to exchange
//! the refresh token: proactive renewal shortly before the access token
//! expires, recovery after a rejected request, and the failure budget that
//! bounds how many times a single failure episode may retry. Concurrent
//! callers collapse onto one in-flight exchange; latecomers pick up the
//! result instead of issuing their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use jiff::Timestamp;
use staffly_core::{Error, ErrorKind, Result};
use tokio::sync::Mutex;

use crate::client::AuthTransport;
use crate::config::SessionConfig;
use crate::token::{AccessClaims, TokenStore, token_expires_within};

/// Tracing target for refresh policy operations.
pub const TRACING_TARGET: &str = "staffly_session::refresh";

/// Lifecycle state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The access token is live and outside the refresh window.
    Valid,
    /// The access token expires within the refresh lead time (or is gone).
    Expiring,
    /// A token exchange is in flight.
    Refreshing,
    /// The failure budget for this episode is exhausted.
    Failed,
}

/// What a component should do after a request came back unauthorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedOutcome {
    /// A refresh succeeded; retry the original request with this token.
    Recovered(String),
    /// Refresh failed but identity is still known; let the guards decide
    /// instead of ending the session.
    SurfaceToGuards,
    /// The session is gone; state has been cleared.
    SessionEnded,
}

struct RefresherInner {
    store: TokenStore,
    transport: Arc<dyn AuthTransport>,
    config: SessionConfig,
    /// Collapses concurrent refresh attempts onto one exchange.
    flight: Mutex<()>,
    /// Consecutive failed exchanges in the current episode.
    failures: AtomicU32,
    refreshing: AtomicBool,
}

/// Drives token renewal against the store and transport.
///
/// Cheaply clonable; clones share the same in-flight lock and failure
/// budget.
#[derive(Clone)]
pub struct SessionRefresher {
    inner: Arc<RefresherInner>,
}

impl std::fmt::Debug for SessionRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRefresher")
            .field("failures", &self.inner.failures.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SessionRefresher {
    /// Creates a refresher over the given store and transport.
    pub fn new(store: TokenStore, transport: Arc<dyn AuthTransport>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                store,
                transport,
                config,
                flight: Mutex::new(()),
                failures: AtomicU32::new(0),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Reports the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.inner.refreshing.load(Ordering::Acquire) {
            return SessionState::Refreshing;
        }
        if self.inner.failures.load(Ordering::Relaxed) >= self.inner.config.max_refresh_attempts {
            return SessionState::Failed;
        }

        let now = Timestamp::now();
        match self.inner.store.access_token_at(now) {
            Some(token) if !token_expires_within(&token, self.inner.config.refresh_lead_time(), now) => {
                SessionState::Valid
            }
            _ => SessionState::Expiring,
        }
    }

    /// Returns an access token that is live and outside the refresh window,
    /// exchanging the refresh token first when necessary.
    ///
    /// When the failure budget runs out the store is cleared and a
    /// `RefreshExhausted` error is returned.
    ///
    /// # Errors
    ///
    /// Fails when no refresh token is available or the exchange itself
    /// fails; the underlying cause is attached as the source.
    pub async fn ensure_fresh(&self) -> Result<String> {
        let now = Timestamp::now();
        if let Some(token) = self.inner.store.access_token_at(now) {
            if !token_expires_within(&token, self.inner.config.refresh_lead_time(), now) {
                return Ok(token);
            }
        }

        match self.try_refresh().await {
            Ok(token) => Ok(token),
            Err(error) => {
                if error.kind() == ErrorKind::RefreshExhausted {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        "refresh budget exhausted, ending session"
                    );
                    self.inner.store.clear();
                }
                Err(error)
            }
        }
    }

    /// Exchanges the refresh token once, single-flight.
    ///
    /// Never clears the store; callers decide what a failure means for the
    /// session. A success resets the failure budget.
    ///
    /// # Errors
    ///
    /// Returns `RefreshExhausted` once the failure budget for the current
    /// episode is spent, `Unauthorized` when no refresh token is stored, and
    /// otherwise whatever the transport reported.
    pub async fn try_refresh(&self) -> Result<String> {
        self.refresh_inner(None).await
    }

    async fn refresh_inner(&self, rejected: Option<&str>) -> Result<String> {
        let _flight = self.inner.flight.lock().await;

        // A concurrent caller may have refreshed while we waited. A stored
        // token equal to the one the backend just rejected never counts,
        // even when its own expiry looks fine: revocation is invisible to
        // the claims.
        let now = Timestamp::now();
        if let Some(token) = self.inner.store.access_token_at(now) {
            if rejected != Some(token.as_str())
                && !token_expires_within(&token, self.inner.config.refresh_lead_time(), now)
            {
                return Ok(token);
            }
        }

        let failures = self.inner.failures.load(Ordering::Relaxed);
        if failures >= self.inner.config.max_refresh_attempts {
            return Err(Error::refresh_exhausted().with_message(format!(
                "gave up after {failures} failed refresh attempts"
            )));
        }

        let Some(refresh_token) = self.inner.store.refresh_token_at(now) else {
            self.inner.failures.fetch_add(1, Ordering::Relaxed);
            return Err(Error::unauthorized().with_message("no refresh token available"));
        };

        self.inner.refreshing.store(true, Ordering::Release);
        let outcome = self.inner.transport.refresh(&refresh_token).await;
        self.inner.refreshing.store(false, Ordering::Release);

        match outcome {
            Ok(grant) => {
                self.inner.store.set_session(
                    grant.access_token.clone(),
                    grant.refresh_token,
                    grant.refresh_token_expires_at,
                );
                self.apply_claims(&grant.access_token);
                self.reset_episode();
                tracing::debug!(target: TRACING_TARGET, "access token refreshed");
                Ok(grant.access_token)
            }
            Err(error) => {
                let failures = self.inner.failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    target: TRACING_TARGET,
                    failures,
                    error = %error,
                    "token refresh failed"
                );
                if failures >= self.inner.config.max_refresh_attempts {
                    Err(Error::refresh_exhausted()
                        .with_message(format!("gave up after {failures} failed refresh attempts"))
                        .with_source(error))
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Decides how to proceed after a request was rejected as unauthorized.
    ///
    /// `rejected_token` is the bearer token the failed request carried; the
    /// exchange only skips the transport when the store already holds a
    /// different, fresh token (a concurrent caller recovered first).
    ///
    /// A successful refresh yields [`UnauthorizedOutcome::Recovered`] with
    /// the new token. When refresh fails but the store still knows who the
    /// user is, the failure is surfaced to the guards rather than ending the
    /// session; only an anonymous failure clears the store.
    pub async fn handle_unauthorized(&self, rejected_token: &str) -> UnauthorizedOutcome {
        match self.refresh_inner(Some(rejected_token)).await {
            Ok(token) => UnauthorizedOutcome::Recovered(token),
            Err(error) => {
                if self.inner.store.user_info().is_some() {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        error = %error,
                        "refresh failed with identity present, deferring to guards"
                    );
                    UnauthorizedOutcome::SurfaceToGuards
                } else {
                    tracing::info!(
                        target: TRACING_TARGET,
                        error = %error,
                        "refresh failed with no identity, session ended"
                    );
                    self.inner.store.clear();
                    UnauthorizedOutcome::SessionEnded
                }
            }
        }
    }

    /// Runs an authorized operation, refreshing and retrying once when it
    /// comes back unauthorized.
    ///
    /// Any outcome other than an unauthorized error closes the failure
    /// episode and resets the budget.
    ///
    /// # Errors
    ///
    /// Propagates the operation's error, or the original unauthorized error
    /// when recovery was not possible.
    pub async fn execute_with_refresh<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.ensure_fresh().await?;
        let result = operation(token.clone()).await;

        let result = match result {
            Err(error) if error.kind() == ErrorKind::Unauthorized => {
                match self.handle_unauthorized(&token).await {
                    UnauthorizedOutcome::Recovered(token) => operation(token).await,
                    UnauthorizedOutcome::SurfaceToGuards | UnauthorizedOutcome::SessionEnded => {
                        Err(error)
                    }
                }
            }
            other => other,
        };

        if !matches!(&result, Err(error) if error.kind() == ErrorKind::Unauthorized) {
            self.reset_episode();
        }
        result
    }

    /// Closes the current failure episode.
    ///
    /// The failure budget bounds retries within one episode; any success
    /// that establishes a working session (a completed request, a fresh
    /// login) opens a new one.
    pub fn reset_episode(&self) {
        self.inner.failures.store(0, Ordering::Relaxed);
    }

    /// Persists the claims of a freshly issued token, tolerating a payload
    /// the client cannot read.
    fn apply_claims(&self, access_token: &str) {
        match AccessClaims::decode(access_token) {
            Ok(claims) => {
                self.inner.store.set_user_info(claims.user_info());
                self.inner.store.set_permission_codes(claims.permission_codes());
            }
            Err(error) => {
                // The backend still accepts the token, keep the session.
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "issued token has an unreadable payload, keeping previous identity"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    use super::*;
    use crate::client::{Credentials, TokenGrant};

    fn token_with_exp(expires_at_secs: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"RS256\",\"typ\":\"JWT\"}");
        let payload = json!({
            "exp": expires_at_secs,
            "sub": "7b7f3a8a-9f1d-4f9e-b5a3-2f1f6d3c4e5a",
            "firstName": "Avery",
        });
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    fn live_token() -> String {
        token_with_exp(Timestamp::now().as_second() + 3_600)
    }

    fn expiring_token() -> String {
        token_with_exp(Timestamp::now().as_second() + 120)
    }

    struct StubTransport {
        responses: std::sync::Mutex<VecDeque<Result<TokenGrant>>>,
        refresh_calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StubTransport {
        fn new(responses: Vec<Result<TokenGrant>>) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses.into()),
                refresh_calls: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn with_delay(responses: Vec<Result<TokenGrant>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses.into()),
                refresh_calls: AtomicUsize::new(0),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.refresh_calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait::async_trait]
    impl AuthTransport for StubTransport {
        async fn login(&self, _credentials: &Credentials) -> Result<TokenGrant> {
            unimplemented!("tests only exercise refresh")
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant> {
            self.refresh_calls.fetch_add(1, Ordering::Relaxed);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::unauthorized().with_message("no stubbed response")))
        }
    }

    fn grant() -> TokenGrant {
        TokenGrant {
            access_token: live_token(),
            refresh_token: "refresh-2".to_owned(),
            refresh_token_expires_at: None,
        }
    }

    fn refresher(
        store: &TokenStore,
        transport: Arc<StubTransport>,
    ) -> SessionRefresher {
        SessionRefresher::new(store.clone(), transport, SessionConfig::default())
    }

    #[tokio::test]
    async fn ensure_fresh_returns_live_token_without_a_call() {
        let store = TokenStore::new();
        store.set_session(live_token(), "refresh-1", None);
        let transport = StubTransport::new(vec![]);
        let refresher = refresher(&store, transport.clone());

        let token = refresher.ensure_fresh().await.unwrap();
        assert_eq!(token, store.access_token().unwrap());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn ensure_fresh_renews_a_token_inside_the_lead_window() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let transport = StubTransport::new(vec![Ok(grant())]);
        let refresher = refresher(&store, transport.clone());

        let token = refresher.ensure_fresh().await.unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(store.access_token().as_deref(), Some(token.as_str()));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-2"));
        // Claims of the new token land in the store.
        assert_eq!(
            store.user_info().unwrap().first_name.as_deref(),
            Some("Avery")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_exchange() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let transport =
            StubTransport::with_delay(vec![Ok(grant())], Duration::from_millis(50));
        let refresher = refresher(&store, transport.clone());

        let (a, b) = tokio::join!(refresher.ensure_fresh(), refresher.ensure_fresh());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn failure_budget_ends_the_session() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let transport = StubTransport::new(vec![
            Err(Error::network_error().with_message("down")),
            Err(Error::network_error().with_message("still down")),
        ]);
        let refresher = refresher(&store, transport.clone());

        let first = refresher.ensure_fresh().await.unwrap_err();
        assert_eq!(first.kind(), ErrorKind::NetworkError);
        assert!(store.refresh_token().is_some());

        // Second failure spends the whole budget and clears the store.
        let second = refresher.ensure_fresh().await.unwrap_err();
        assert_eq!(second.kind(), ErrorKind::RefreshExhausted);
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert_eq!(refresher.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn unauthorized_with_identity_defers_to_guards() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let claims = AccessClaims::decode(&live_token()).unwrap();
        store.set_user_info(claims.user_info());

        let transport =
            StubTransport::new(vec![Err(Error::unauthorized().with_message("rejected"))]);
        let refresher = refresher(&store, transport);

        let rejected = store.access_token().unwrap();
        let outcome = refresher.handle_unauthorized(&rejected).await;
        assert_eq!(outcome, UnauthorizedOutcome::SurfaceToGuards);
        assert!(store.user_info().is_some());
    }

    #[tokio::test]
    async fn unauthorized_without_identity_ends_the_session() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let transport =
            StubTransport::new(vec![Err(Error::unauthorized().with_message("rejected"))]);
        let refresher = refresher(&store, transport);

        let rejected = store.access_token().unwrap();
        let outcome = refresher.handle_unauthorized(&rejected).await;
        assert_eq!(outcome, UnauthorizedOutcome::SessionEnded);
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[tokio::test]
    async fn rejected_token_is_exchanged_even_while_its_claims_look_live() {
        // Revocation is invisible to the expiry claim: a 401 on a token that
        // still looks fresh must reach the transport, not hand the same
        // token back.
        let store = TokenStore::new();
        // Live and outside the lead window, but distinct from the grant's
        // replacement token.
        let old = token_with_exp(Timestamp::now().as_second() + 1_800);
        store.set_session(old.clone(), "refresh-1", None);
        let transport = StubTransport::new(vec![Ok(grant())]);
        let refresher = refresher(&store, transport.clone());

        let outcome = refresher.handle_unauthorized(&old).await;
        let UnauthorizedOutcome::Recovered(new) = outcome else {
            panic!("expected recovery, got {outcome:?}");
        };
        assert_ne!(new, old);
        assert_eq!(transport.calls(), 1);

        // A second report of the same stale token finds the store already
        // holding a different fresh token and skips the transport.
        let outcome = refresher.handle_unauthorized(&old).await;
        assert_eq!(outcome, UnauthorizedOutcome::Recovered(new));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn reset_episode_opens_a_new_failure_budget() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let transport = StubTransport::new(vec![
            Err(Error::network_error().with_message("down")),
            Err(Error::network_error().with_message("still down")),
            Ok(grant()),
        ]);
        let refresher = refresher(&store, transport.clone());

        refresher.ensure_fresh().await.unwrap_err();
        let error = refresher.ensure_fresh().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::RefreshExhausted);
        assert_eq!(refresher.state(), SessionState::Failed);

        // A fresh session opens a fresh episode; the spent budget must not
        // leak into it.
        refresher.reset_episode();
        store.set_session(expiring_token(), "refresh-2", None);

        let token = refresher.ensure_fresh().await.unwrap();
        assert_eq!(store.access_token().as_deref(), Some(token.as_str()));
        assert_eq!(transport.calls(), 3);
        assert_eq!(refresher.state(), SessionState::Valid);
    }

    #[tokio::test]
    async fn execute_retries_exactly_once_after_unauthorized() {
        let store = TokenStore::new();
        store.set_session(live_token(), "refresh-1", None);
        let transport = StubTransport::new(vec![Ok(grant())]);
        let refresher = refresher(&store, transport.clone());

        let attempts = AtomicUsize::new(0);
        let result: Result<&str> = refresher
            .execute_with_refresh(|_token| {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                async move {
                    if attempt == 0 {
                        Err(Error::unauthorized().with_message("stale token"))
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "payload");
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn execute_surfaces_unauthorized_when_recovery_fails() {
        let store = TokenStore::new();
        store.set_session(live_token(), "refresh-1", None);
        let claims = AccessClaims::decode(&live_token()).unwrap();
        store.set_user_info(claims.user_info());

        let transport =
            StubTransport::new(vec![Err(Error::unauthorized().with_message("rejected"))]);
        let refresher = refresher(&store, transport);

        let attempts = AtomicUsize::new(0);
        let result: Result<()> = refresher
            .execute_with_refresh(|_token| {
                attempts.fetch_add(1, Ordering::Relaxed);
                async { Err(Error::unauthorized().with_message("nope")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
        // Identity survives; the guards get to decide.
        assert!(store.user_info().is_some());
    }

    #[tokio::test]
    async fn state_tracks_the_token_lifecycle() {
        let store = TokenStore::new();
        let transport = StubTransport::new(vec![]);
        let refresher = refresher(&store, transport);

        assert_eq!(refresher.state(), SessionState::Expiring);

        store.set_session(live_token(), "refresh-1", None);
        assert_eq!(refresher.state(), SessionState::Valid);

        store.set_session(expiring_token(), "refresh-1", None);
        assert_eq!(refresher.state(), SessionState::Expiring);
    }

    #[tokio::test(start_paused = true)]
    async fn state_reports_refreshing_while_an_exchange_is_in_flight() {
        let store = TokenStore::new();
        store.set_session(expiring_token(), "refresh-1", None);
        let transport =
            StubTransport::with_delay(vec![Ok(grant())], Duration::from_millis(50));
        let refresher = refresher(&store, transport);

        let in_flight = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.ensure_fresh().await }
        });

        // Let the spawned exchange reach the transport call.
        while refresher.state() != SessionState::Refreshing {
            tokio::task::yield_now().await;
        }

        in_flight.await.unwrap().unwrap();
        assert_eq!(refresher.state(), SessionState::Valid);
    }
}
