//! Effective permission computation.
//!
//! [`PermissionProvider`] derives what the current user may do from the
//! token store: the admin role short-circuits to every capability, everyone
//! else holds the baseline set plus whatever their issued backend codes map
//! to. An empty store yields the baseline set so first paint renders the
//! common chrome; [`EffectivePermissions::ready`] tells consumers whether
//! permission data has actually arrived.

use std::collections::HashSet;

use staffly_core::{Capability, PermissionClaim, PermissionCode, Role, to_capabilities};
use tokio::sync::watch;

use crate::token::{TokenStore, UserInfo};

/// Tracing target for permission resolution.
pub const TRACING_TARGET: &str = "staffly_session::provider";

/// A point-in-time snapshot of the current user's permissions.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePermissions {
    capabilities: HashSet<Capability>,
    issued_codes: Vec<PermissionCode>,
    role: Option<Role>,
    ready: bool,
}

impl EffectivePermissions {
    /// Checks whether the snapshot grants the given capability.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Checks whether the snapshot grants all of the given capabilities.
    #[must_use]
    pub fn has_all(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|capability| self.has(*capability))
    }

    /// Returns the granted capability set.
    #[must_use]
    pub fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    /// Returns the backend codes the snapshot was derived from, as claims
    /// suitable for [`staffly_core::has_any`].
    #[must_use]
    pub fn issued_claims(&self) -> Vec<PermissionClaim> {
        self.issued_codes.iter().cloned().map(PermissionClaim::from).collect()
    }

    /// Returns the normalized role, when identity is known.
    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    /// Checks whether the user holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// Checks whether the user holds the employee role.
    #[must_use]
    pub fn is_employee(&self) -> bool {
        self.role == Some(Role::Employee)
    }

    /// Whether permission data has arrived in the store.
    ///
    /// A not-ready snapshot still grants the baseline set, so consumers can
    /// distinguish "denied" from "not loaded yet".
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }
}

/// Derives effective permissions from the token store.
#[derive(Debug, Clone)]
pub struct PermissionProvider {
    store: TokenStore,
}

impl PermissionProvider {
    /// Creates a provider over the given store.
    #[must_use]
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }

    /// Computes a snapshot from the store's current contents.
    #[must_use]
    pub fn snapshot(&self) -> EffectivePermissions {
        let user_info = self.store.user_info();
        let issued = self.store.permission_codes();
        let role = user_info.as_ref().and_then(UserInfo::role);
        let ready = issued.is_some();
        let issued_codes = issued.unwrap_or_default();

        let capabilities = if role == Some(Role::Admin) {
            Capability::all().into_iter().collect()
        } else {
            let mut capabilities: HashSet<Capability> =
                Capability::BASELINE.iter().copied().collect();
            capabilities.extend(to_capabilities(issued_codes.iter().cloned()));
            capabilities
        };

        tracing::trace!(
            target: TRACING_TARGET,
            role = ?role,
            ready,
            capabilities = capabilities.len(),
            "permission snapshot computed"
        );

        EffectivePermissions {
            capabilities,
            issued_codes,
            role,
            ready,
        }
    }

    /// Checks a single capability against the current store contents.
    #[must_use]
    pub fn has_permission(&self, capability: Capability) -> bool {
        self.snapshot().has(capability)
    }

    /// Checks whether the current user is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.snapshot().is_admin()
    }

    /// Subscribes to store changes; recompute the snapshot when the revision
    /// moves.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }
}
