//! The session facade.
//!
//! [`Session`] wires the store, transport, refresh policy, and permission
//! provider together behind one handle, which is what an embedding
//! application is expected to hold onto.

use std::sync::Arc;

use staffly_core::Result;
use tokio::sync::watch;

use crate::client::{AuthClient, AuthTransport, Credentials};
use crate::config::SessionConfig;
use crate::guard::PageGuard;
use crate::provider::{EffectivePermissions, PermissionProvider};
use crate::refresh::{SessionRefresher, SessionState, UnauthorizedOutcome};
use crate::token::{AccessClaims, TokenStore, UserInfo};

/// Tracing target for session lifecycle operations.
pub const TRACING_TARGET: &str = "staffly_session::session";

/// The top-level session handle.
///
/// Cheaply clonable; every clone shares the same store, refresh policy, and
/// failure budget.
#[derive(Clone)]
pub struct Session {
    store: TokenStore,
    transport: Arc<dyn AuthTransport>,
    refresher: SessionRefresher,
    provider: PermissionProvider,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session backed by the HTTP authentication client.
    ///
    /// # Errors
    ///
    /// Fails when the configuration cannot produce an HTTP client.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let client = AuthClient::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(client)))
    }

    /// Creates a session over a custom transport.
    #[must_use]
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn AuthTransport>) -> Self {
        let store = TokenStore::new();
        let refresher = SessionRefresher::new(store.clone(), transport.clone(), config);
        let provider = PermissionProvider::new(store.clone());
        Self {
            store,
            transport,
            refresher,
            provider,
        }
    }

    /// Logs in and populates the store from the issued token.
    ///
    /// Returns the decoded identity. A grant whose access token payload
    /// cannot be read is still persisted, since the backend accepts the
    /// token regardless; identity then stays unknown until the next refresh.
    ///
    /// # Errors
    ///
    /// Propagates the transport error: `Unauthorized` for rejected
    /// credentials, `Conflict` for an account state that prevents login, and
    /// `NetworkError` for transport failures.
    pub async fn login(&self, credentials: &Credentials) -> Result<Option<UserInfo>> {
        let grant = self.transport.login(credentials).await?;
        self.store.set_session(
            grant.access_token.clone(),
            grant.refresh_token,
            grant.refresh_token_expires_at,
        );
        // A fresh login opens a fresh failure episode.
        self.refresher.reset_episode();

        match AccessClaims::decode(&grant.access_token) {
            Ok(claims) => {
                let user_info = claims.user_info();
                self.store.set_user_info(user_info.clone());
                self.store.set_permission_codes(claims.permission_codes());
                tracing::info!(
                    target: TRACING_TARGET,
                    subject = %user_info.subject,
                    "logged in"
                );
                Ok(Some(user_info))
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "issued token has an unreadable payload, identity unknown"
                );
                Ok(None)
            }
        }
    }

    /// Ends the session and clears all stored state.
    pub fn logout(&self) {
        self.store.clear();
        tracing::info!(target: TRACING_TARGET, "logged out");
    }

    /// Checks whether any session artifact survives.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.user_info().is_some()
            || self.store.access_token().is_some()
            || self.store.refresh_token().is_some()
    }

    /// Returns the stored identity, when known.
    #[must_use]
    pub fn user_info(&self) -> Option<UserInfo> {
        self.store.user_info()
    }

    /// Computes a permission snapshot from the current store contents.
    #[must_use]
    pub fn permissions(&self) -> EffectivePermissions {
        self.provider.snapshot()
    }

    /// Creates a page guard over this session's store.
    #[must_use]
    pub fn page_guard(&self) -> PageGuard {
        PageGuard::new(self.store.clone())
    }

    /// Reports the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.refresher.state()
    }

    /// Returns an `Authorization` header value with a token that is live and
    /// outside the refresh window, refreshing first when necessary.
    ///
    /// # Errors
    ///
    /// Fails when no token is available and the refresh policy cannot
    /// produce one.
    pub async fn authorized_bearer(&self) -> Result<String> {
        let token = self.refresher.ensure_fresh().await?;
        Ok(format!("Bearer {token}"))
    }

    /// Runs an authorized operation through the refresh policy, retrying
    /// once when it comes back unauthorized.
    ///
    /// # Errors
    ///
    /// Propagates the operation's error when recovery is not possible.
    pub async fn execute_with_refresh<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.refresher.execute_with_refresh(operation).await
    }

    /// Decides how to proceed after a request was rejected as unauthorized.
    ///
    /// `rejected_token` is the bearer token the failed request carried.
    pub async fn handle_unauthorized(&self, rejected_token: &str) -> UnauthorizedOutcome {
        self.refresher.handle_unauthorized(rejected_token).await
    }

    /// Subscribes to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    /// Returns the underlying token store.
    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Returns the refresh policy driver.
    #[must_use]
    pub fn refresher(&self) -> &SessionRefresher {
        &self.refresher
    }
}
