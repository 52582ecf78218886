//! Role normalization.
//!
//! Role claims arrive either as a bare string (`"Admin"`) or as a
//! `{ "name": ... }` object depending on whether they come from the token or
//! the user-profile endpoint. [`RoleClaim`] models both shapes and
//! [`RoleClaim::normalize`] collapses them into a [`Role`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// A normalized portal role.
///
/// The `admin` and `employee` literals are recognized case-insensitively;
/// anything else is a custom role whose original spelling is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[derive(EnumString, AsRefStr)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Role {
    /// The administrator role; bypasses every permission check.
    Admin,
    /// The literal employee role.
    Employee,
    /// Any backend-defined custom role.
    #[strum(default)]
    Custom(String),
}

impl Role {
    /// Returns true for the administrator role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns true for the literal employee role.
    #[must_use]
    pub fn is_employee(&self) -> bool {
        matches!(self, Self::Employee)
    }
}

/// A role claim as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleClaim {
    /// A bare role name string.
    Name(String),
    /// A `{ "name": ... }` record.
    Record {
        /// The role name field.
        name: String,
    },
}

impl RoleClaim {
    /// Collapses either wire shape into a normalized [`Role`].
    #[must_use]
    pub fn normalize(&self) -> Role {
        let raw = match self {
            Self::Name(name) => name,
            Self::Record { name } => name,
        };

        // EnumString with a default variant never fails to parse.
        raw.trim().parse().unwrap_or(Role::Custom(raw.clone()))
    }
}

impl From<&str> for RoleClaim {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_literal_is_case_insensitive() {
        assert_eq!(RoleClaim::from("Admin").normalize(), Role::Admin);
        assert_eq!(RoleClaim::from("ADMIN").normalize(), Role::Admin);
        assert_eq!(RoleClaim::from("admin").normalize(), Role::Admin);
    }

    #[test]
    fn employee_literal_is_recognized() {
        assert_eq!(RoleClaim::from("Employee").normalize(), Role::Employee);
        assert!(RoleClaim::from("employee").normalize().is_employee());
    }

    #[test]
    fn unknown_role_becomes_custom() {
        let role = RoleClaim::from("Payroll Supervisor").normalize();
        assert_eq!(role, Role::Custom("Payroll Supervisor".to_owned()));
        assert!(!role.is_admin());
        assert!(!role.is_employee());
    }

    #[test]
    fn record_shape_normalizes_like_string_shape() {
        let record: RoleClaim = serde_json::from_str("{\"name\":\"Admin\"}").unwrap();
        assert_eq!(record.normalize(), Role::Admin);

        let bare: RoleClaim = serde_json::from_str("\"Admin\"").unwrap();
        assert_eq!(bare.normalize(), Role::Admin);
    }

    #[test]
    fn whitespace_is_trimmed_before_matching() {
        assert_eq!(RoleClaim::from("  admin ").normalize(), Role::Admin);
    }
}
