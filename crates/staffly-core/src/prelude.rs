//! Convenient re-exports for common use.

pub use crate::capability::Capability;
pub use crate::code::{PermissionClaim, PermissionCode};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::mapping::{has_any, to_capabilities};
pub use crate::role::{Role, RoleClaim};
