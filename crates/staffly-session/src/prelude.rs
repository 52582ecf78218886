//! Convenient re-exports for common use.

pub use staffly_core::prelude::*;

pub use crate::client::{AuthClient, AuthTransport, Credentials, TokenGrant};
pub use crate::config::SessionConfig;
pub use crate::guard::{ActionDecision, ActionGuard, PageDecision, PageGuard, PageRequest};
pub use crate::provider::{EffectivePermissions, PermissionProvider};
pub use crate::refresh::{SessionRefresher, SessionState, UnauthorizedOutcome};
pub use crate::session::Session;
pub use crate::token::{AccessClaims, TokenStore, UserInfo};
