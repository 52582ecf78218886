//! Backend permission codes and their wire-shape normalization.
//!
//! The backend issues permission codes as `"<Resource>.<Action>"` strings,
//! but depending on the endpoint a code may arrive either as a bare string or
//! wrapped in a `{ "code": ... }` object. [`PermissionClaim`] models both
//! shapes explicitly and [`PermissionClaim::normalize`] is the single place
//! they collapse into a [`PermissionCode`].

use derive_more::{AsRef, Display};
use serde::{Deserialize, Serialize};

/// An opaque, case-sensitive backend permission code.
///
/// Codes follow the `"<Resource>.<Action>"` convention (e.g.
/// `"Department.Create"`) but are compared verbatim; the split accessors are
/// conveniences, not validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, AsRef, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Creates a permission code, trimming surrounding whitespace.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_owned())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `<Resource>` part, i.e. everything before the first dot.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(r, _)| r)
    }

    /// Returns the `<Action>` part, or an empty string when no dot is present.
    #[must_use]
    pub fn action(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, a)| a)
    }

    /// Returns true if the code is empty after trimming.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PermissionCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for PermissionCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

/// A permission code as it appears on the wire.
///
/// Older backend endpoints return bare strings, newer ones return
/// `{ "code": ... }` records. Both deserialize into this enum; call
/// [`normalize`] to obtain the canonical [`PermissionCode`].
///
/// [`normalize`]: PermissionClaim::normalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionClaim {
    /// A bare `"Resource.Action"` string.
    Code(String),
    /// A `{ "code": "Resource.Action" }` record.
    Record {
        /// The permission code field.
        code: String,
    },
}

impl PermissionClaim {
    /// Collapses either wire shape into a trimmed [`PermissionCode`].
    ///
    /// Returns `None` when the code is empty after trimming, so blank
    /// entries never participate in permission checks.
    #[must_use]
    pub fn normalize(&self) -> Option<PermissionCode> {
        let raw = match self {
            Self::Code(code) => code,
            Self::Record { code } => code,
        };

        let code = PermissionCode::new(raw.as_str());
        if code.is_empty() { None } else { Some(code) }
    }
}

impl From<PermissionCode> for PermissionClaim {
    fn from(code: PermissionCode) -> Self {
        Self::Code(code.0)
    }
}

impl From<&str> for PermissionClaim {
    fn from(code: &str) -> Self {
        Self::Code(code.to_owned())
    }
}
