//! Route and action guards.
//!
//! [`PageGuard`] decides whether a navigation may proceed and where to send
//! the user otherwise; [`ActionGuard`] decides whether a piece of UI should
//! render, stay hidden, or show a loading state while permission data is
//! still on its way.
//!
//! Both guards lean permissive for users whose data has not arrived yet,
//! with one deliberate exception: an action guard configured with no
//! requirements at all denies, so a misconfigured guard never silently
//! exposes an elevated action.

use staffly_core::{Capability, PermissionClaim, has_any};

use crate::provider::{EffectivePermissions, PermissionProvider};
use crate::token::TokenStore;

/// Tracing target for guard decisions.
pub const TRACING_TARGET: &str = "staffly_session::guard";

/// The page a navigation is headed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// The admin dashboard.
    AdminDashboard,
    /// The employee dashboard.
    EmployeeDashboard,
    /// Any other protected page.
    Other,
}

/// Outcome of a page guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDecision {
    /// Let the navigation proceed.
    Allow,
    /// No session; send the user to the login page.
    RedirectToLogin,
    /// Session exists but this is the wrong dashboard variant.
    RedirectTo(PageRequest),
}

/// Guards protected pages.
#[derive(Debug, Clone)]
pub struct PageGuard {
    store: TokenStore,
    provider: PermissionProvider,
}

impl PageGuard {
    /// Creates a page guard over the given store.
    #[must_use]
    pub fn new(store: TokenStore) -> Self {
        let provider = PermissionProvider::new(store.clone());
        Self { store, provider }
    }

    /// Evaluates a navigation to the given page.
    ///
    /// Any surviving session artifact counts as authenticated, so a user
    /// whose access token lapsed but who still holds a refresh token is not
    /// bounced to login mid-renewal. Dashboard requests are steered to the
    /// variant the user's permissions call for.
    #[must_use]
    pub fn evaluate(&self, page: PageRequest) -> PageDecision {
        let authenticated = self.store.user_info().is_some()
            || self.store.access_token().is_some()
            || self.store.refresh_token().is_some();

        if !authenticated {
            tracing::debug!(target: TRACING_TARGET, ?page, "no session, redirecting to login");
            return PageDecision::RedirectToLogin;
        }

        let snapshot = self.provider.snapshot();
        let decision = match page {
            PageRequest::AdminDashboard if !snapshot.has(Capability::AdminDashboard) => {
                PageDecision::RedirectTo(PageRequest::EmployeeDashboard)
            }
            PageRequest::EmployeeDashboard if snapshot.has(Capability::AdminDashboard) => {
                PageDecision::RedirectTo(PageRequest::AdminDashboard)
            }
            _ => PageDecision::Allow,
        };

        tracing::trace!(target: TRACING_TARGET, ?page, ?decision, "page evaluated");
        decision
    }
}

/// Outcome of an action guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDecision {
    /// Render the guarded UI.
    Render,
    /// Hide the guarded UI.
    Unauthorized,
    /// Permission data has not arrived; show a placeholder.
    Loading,
}

/// Declarative requirements for a guarded action.
///
/// Requirements are any-of on both axes: holding one of the listed
/// capabilities, or one of the listed backend codes, is enough. An
/// explicitly empty backend-code list means "no code required" and renders;
/// a guard with no requirements at all denies.
#[derive(Debug, Clone, Default)]
pub struct ActionGuard {
    capabilities: Vec<Capability>,
    backend_codes: Option<Vec<PermissionClaim>>,
}

impl ActionGuard {
    /// Creates a guard with no requirements.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required capability (any-of).
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Adds required capabilities (any-of).
    #[must_use]
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// Sets the required backend codes (any-of).
    ///
    /// Passing an empty list is an explicit "no code required".
    #[must_use]
    pub fn backend_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PermissionClaim>,
    {
        self.backend_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Evaluates the guard against a permission snapshot.
    #[must_use]
    pub fn evaluate(&self, permissions: &EffectivePermissions) -> ActionDecision {
        if permissions.is_admin() {
            return ActionDecision::Render;
        }

        if matches!(self.backend_codes.as_deref(), Some([])) {
            return ActionDecision::Render;
        }

        if self.capabilities.is_empty() && self.backend_codes.is_none() {
            tracing::debug!(
                target: TRACING_TARGET,
                "guard has no requirements, denying"
            );
            return ActionDecision::Unauthorized;
        }

        let capability_satisfied = self
            .capabilities
            .iter()
            .any(|capability| permissions.has(*capability));
        let code_satisfied = self
            .backend_codes
            .as_deref()
            .is_some_and(|required| has_any(&permissions.issued_claims(), required));

        if capability_satisfied || code_satisfied {
            ActionDecision::Render
        } else if !permissions.ready() {
            ActionDecision::Loading
        } else {
            ActionDecision::Unauthorized
        }
    }
}
