//! The process-wide token store.
//!
//! Models the portal's cookie jar: five named slots (access token, refresh
//! token, refresh expiry, user info, permission codes), each with its own
//! lifetime, reading as absent once past it. The store is the single writer
//! boundary for session state; every other component only reads.
//!
//! Mutations bump a watch-channel revision so consumers can subscribe to
//! session changes instead of polling on a timer.

use std::sync::{Arc, PoisonError, RwLock};

use jiff::{SignedDuration, Timestamp};
use staffly_core::PermissionCode;
use tokio::sync::watch;

use super::claims::UserInfo;

/// Tracing target for token store operations.
pub const TRACING_TARGET: &str = "staffly_session::store";

/// Fixed client-side lifetime of the access token slot.
///
/// Deliberately independent of the token's own `exp` claim: the stored copy
/// is advisory, real enforcement is the claim itself.
const ACCESS_TOKEN_TTL: SignedDuration = SignedDuration::from_hours(48);

/// Refresh-token lifetime bounds, in days.
const REFRESH_TTL_MIN_DAYS: i64 = 1;
const REFRESH_TTL_MAX_DAYS: i64 = 20;

/// A stored value with its client-side expiry.
#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    expires_at: Timestamp,
}

impl<T: Clone> Entry<T> {
    fn new(value: T, expires_at: Timestamp) -> Self {
        Self { value, expires_at }
    }

    fn live(&self, now: Timestamp) -> Option<T> {
        (now < self.expires_at).then(|| self.value.clone())
    }
}

#[derive(Debug, Default)]
struct Slots {
    access_token: Option<Entry<String>>,
    refresh_token: Option<Entry<String>>,
    refresh_expires_at: Option<Entry<Timestamp>>,
    user_info: Option<Entry<UserInfo>>,
    permission_codes: Option<Entry<Vec<PermissionCode>>>,
}

struct Inner {
    slots: RwLock<Slots>,
    revision: watch::Sender<u64>,
}

/// Process-wide session state store.
///
/// Cheaply clonable handle; every clone shares the same slots and revision
/// channel. All operations are idempotent and independent of call order.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                slots: RwLock::new(Slots::default()),
                revision,
            }),
        }
    }

    /// Persists both tokens of a grant.
    ///
    /// The access token slot always lives [`ACCESS_TOKEN_TTL`]; the refresh
    /// token slot lives `clamp(days until expiry, 1, 20)` days when the
    /// backend supplied an expiry, 20 days otherwise.
    pub fn set_session(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        refresh_expires_at: Option<Timestamp>,
    ) {
        let now = Timestamp::now();
        let refresh_ttl = refresh_ttl(now, refresh_expires_at);

        {
            let mut slots = self.write();
            slots.access_token = Some(Entry::new(access_token.into(), at(now, ACCESS_TOKEN_TTL)));
            slots.refresh_token = Some(Entry::new(refresh_token.into(), at(now, refresh_ttl)));
            slots.refresh_expires_at =
                refresh_expires_at.map(|expiry| Entry::new(expiry, at(now, refresh_ttl)));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            refresh_ttl_hours = refresh_ttl.as_hours(),
            "session tokens persisted"
        );
        self.bump();
    }

    /// Returns the access token, or `None` once its slot has lapsed.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.access_token_at(Timestamp::now())
    }

    pub(crate) fn access_token_at(&self, now: Timestamp) -> Option<String> {
        self.read().access_token.as_ref().and_then(|e| e.live(now))
    }

    /// Returns the refresh token, or `None` once its slot has lapsed.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token_at(Timestamp::now())
    }

    pub(crate) fn refresh_token_at(&self, now: Timestamp) -> Option<String> {
        self.read().refresh_token.as_ref().and_then(|e| e.live(now))
    }

    /// Returns the backend-reported refresh token expiry, when known.
    #[must_use]
    pub fn refresh_expires_at(&self) -> Option<Timestamp> {
        let now = Timestamp::now();
        self.read().refresh_expires_at.as_ref().and_then(|e| e.live(now))
    }

    /// Persists the decoded identity subset.
    pub fn set_user_info(&self, user_info: UserInfo) {
        let now = Timestamp::now();
        // Identity and permission slots share the access token lifetime.
        self.write().user_info = Some(Entry::new(user_info, at(now, ACCESS_TOKEN_TTL)));
        self.bump();
    }

    /// Returns the decoded identity subset, when present.
    #[must_use]
    pub fn user_info(&self) -> Option<UserInfo> {
        let now = Timestamp::now();
        self.read().user_info.as_ref().and_then(|e| e.live(now))
    }

    /// Persists the issued permission codes.
    pub fn set_permission_codes(&self, codes: Vec<PermissionCode>) {
        let now = Timestamp::now();
        self.write().permission_codes = Some(Entry::new(codes, at(now, ACCESS_TOKEN_TTL)));
        self.bump();
    }

    /// Returns the issued permission codes, when present.
    #[must_use]
    pub fn permission_codes(&self) -> Option<Vec<PermissionCode>> {
        let now = Timestamp::now();
        self.read().permission_codes.as_ref().and_then(|e| e.live(now))
    }

    /// Removes every slot.
    ///
    /// Atomic from the caller's point of view: readers observe either the
    /// full previous state or the empty state, never a partial clear.
    pub fn clear(&self) {
        *self.write() = Slots::default();
        tracing::debug!(target: TRACING_TARGET, "session state cleared");
        self.bump();
    }

    /// Subscribes to session changes.
    ///
    /// The channel carries a revision counter that increases on every
    /// mutation; consumers re-read the store when it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Returns the current revision counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Slots> {
        self.inner.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Slots> {
        self.inner.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Saturating `now + ttl`.
fn at(now: Timestamp, ttl: SignedDuration) -> Timestamp {
    now.checked_add(ttl).unwrap_or(Timestamp::MAX)
}

/// Client-side refresh token lifetime for a backend-reported expiry.
fn refresh_ttl(now: Timestamp, refresh_expires_at: Option<Timestamp>) -> SignedDuration {
    let days = match refresh_expires_at {
        None => REFRESH_TTL_MAX_DAYS,
        Some(expiry) => {
            let remaining = expiry.duration_since(now);
            (remaining.as_secs() / 86_400).clamp(REFRESH_TTL_MIN_DAYS, REFRESH_TTL_MAX_DAYS)
        }
    };
    SignedDuration::from_hours(days * 24)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn sample_user_info() -> UserInfo {
        UserInfo {
            subject: Uuid::new_v4(),
            unique_name: Some("avery.hr".to_owned()),
            first_name: Some("Avery".to_owned()),
            last_name: Some("Quinn".to_owned()),
            job_title: None,
            company_id: None,
            role: Some("Employee".into()),
        }
    }

    #[test]
    fn set_session_round_trips_tokens() {
        let store = TokenStore::new();
        store.set_session("access-1", "refresh-1", None);

        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(store.refresh_expires_at(), None);
    }

    #[test]
    fn permission_codes_round_trip_order_insensitively() {
        let store = TokenStore::new();
        let codes = vec![
            PermissionCode::new("Team.View"),
            PermissionCode::new("Department.View"),
        ];
        store.set_permission_codes(codes.clone());

        let mut stored = store.permission_codes().unwrap();
        let mut expected = codes;
        stored.sort();
        expected.sort();
        assert_eq!(stored, expected);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = TokenStore::new();
        store.set_session("access", "refresh", None);
        store.set_user_info(sample_user_info());
        store.set_permission_codes(vec![PermissionCode::new("Role.View")]);

        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user_info().is_none());
        assert!(store.permission_codes().is_none());

        // A second clear leaves the same empty state.
        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user_info().is_none());
        assert!(store.permission_codes().is_none());
    }

    #[test]
    fn entries_lapse_after_their_ttl() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let entry = Entry::new("value".to_owned(), at(now, ACCESS_TOKEN_TTL));

        assert_eq!(entry.live(now).as_deref(), Some("value"));
        let later = at(now, SignedDuration::from_hours(49));
        assert_eq!(entry.live(later), None);
    }

    #[test]
    fn refresh_ttl_clamps_to_policy_bounds() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();

        // No expiry reported: fixed 20-day default.
        assert_eq!(refresh_ttl(now, None), SignedDuration::from_hours(20 * 24));

        // Far-future expiry clamps down to 20 days.
        let far = at(now, SignedDuration::from_hours(90 * 24));
        assert_eq!(refresh_ttl(now, Some(far)), SignedDuration::from_hours(20 * 24));

        // Near (or past) expiry clamps up to 1 day.
        let past = Timestamp::from_second(1_600_000_000).unwrap();
        assert_eq!(refresh_ttl(now, Some(past)), SignedDuration::from_hours(24));

        // In-range expiry keeps its whole-day count.
        let five_days = at(now, SignedDuration::from_hours(5 * 24 + 1));
        assert_eq!(refresh_ttl(now, Some(five_days)), SignedDuration::from_hours(5 * 24));
    }

    #[test]
    fn mutations_bump_the_revision() {
        let store = TokenStore::new();
        let receiver = store.subscribe();
        let initial = *receiver.borrow();

        store.set_session("access", "refresh", None);
        store.set_permission_codes(vec![]);
        store.clear();

        assert_eq!(store.revision(), initial + 3);
        assert!(receiver.has_changed().unwrap());
    }
}
