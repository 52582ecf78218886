//! Static mapping between backend permission codes and frontend capabilities.
//!
//! The forward table lists, for each elevated [`Capability`], the backend
//! codes that unlock it. The inverse direction is derived by scanning the
//! same table, so the two can never drift apart; a unit test additionally
//! asserts the bijective consistency invariant.

use std::collections::HashSet;

use crate::capability::Capability;
use crate::code::{PermissionClaim, PermissionCode};

/// Forward mapping: capability to the backend codes that unlock it.
///
/// Baseline capabilities are granted by default and intentionally have no
/// entry here. A code may appear under more than one capability.
const FORWARD: &[(Capability, &[&str])] = &[
    (Capability::AdminDashboard, &["Dashboard.Admin"]),
    (Capability::ViewEmployees, &["User.View"]),
    (
        Capability::ManageEmployees,
        &["User.Create", "User.Update", "User.Delete"],
    ),
    (Capability::ViewDepartments, &["Department.View"]),
    (
        Capability::ManageDepartments,
        &["Department.Create", "Department.Update", "Department.Delete"],
    ),
    (Capability::ViewTeams, &["Team.View"]),
    (
        Capability::ManageTeams,
        &["Team.Create", "Team.Update", "Team.Delete"],
    ),
    (Capability::ViewRoles, &["Role.View"]),
    (
        Capability::ManageRoles,
        &["Role.Create", "Role.Update", "Role.Delete", "Role.AssignPermissions"],
    ),
    (Capability::ViewLeaveRequests, &["LeaveRequest.View"]),
    (
        Capability::ManageLeaveRequests,
        &["LeaveRequest.Approve", "LeaveRequest.Reject"],
    ),
    (Capability::ViewAttendance, &["Attendance.View"]),
    (Capability::ManageAttendance, &["Attendance.Update"]),
    (
        Capability::ManageCompanySettings,
        &["Company.Update", "Company.ManageSettings"],
    ),
];

/// Returns the backend codes that unlock the given capability.
///
/// Baseline capabilities return an empty slice; they are granted by default.
#[must_use]
pub fn codes_for_capability(capability: Capability) -> &'static [&'static str] {
    FORWARD
        .iter()
        .find(|(cap, _)| *cap == capability)
        .map_or(&[], |(_, codes)| codes)
}

/// Returns the capabilities a single backend code unlocks.
///
/// Unknown codes yield an empty iterator.
pub fn capabilities_for_code(code: &PermissionCode) -> impl Iterator<Item = Capability> + '_ {
    FORWARD
        .iter()
        .filter(move |(_, codes)| codes.contains(&code.as_str()))
        .map(|(capability, _)| *capability)
}

/// Translates a set of issued backend codes into frontend capabilities.
///
/// The result is the union over all inputs; codes absent from the mapping
/// table contribute nothing and are silently ignored.
pub fn to_capabilities<I>(codes: I) -> HashSet<Capability>
where
    I: IntoIterator,
    I::Item: Into<PermissionClaim>,
{
    codes
        .into_iter()
        .filter_map(|claim| claim.into().normalize())
        .flat_map(|code| capabilities_for_code(&code).collect::<Vec<_>>())
        .collect()
}

/// Tests whether the user holds any of the required backend codes.
///
/// Both sides are normalized through [`PermissionClaim`], so either may mix
/// bare strings and `{ "code": ... }` records, and surrounding whitespace is
/// ignored. Returns false when either side is empty: an absent requirement
/// list and an absent grant list both fail closed here.
pub fn has_any(user_codes: &[PermissionClaim], required_codes: &[PermissionClaim]) -> bool {
    let user: HashSet<PermissionCode> =
        user_codes.iter().filter_map(PermissionClaim::normalize).collect();
    if user.is_empty() {
        return false;
    }

    required_codes
        .iter()
        .filter_map(PermissionClaim::normalize)
        .any(|required| user.contains(&required))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use strum::IntoEnumIterator;

    use super::*;

    fn claims(codes: &[&str]) -> Vec<PermissionClaim> {
        codes.iter().map(|code| PermissionClaim::from(*code)).collect()
    }

    #[test]
    fn forward_entries_cover_exactly_the_elevated_capabilities() {
        let mapped: HashSet<Capability> = FORWARD.iter().map(|(cap, _)| *cap).collect();
        for capability in Capability::iter() {
            assert_eq!(
                mapped.contains(&capability),
                capability.is_elevated(),
                "mapping table disagrees with baseline classification for {capability:?}"
            );
        }
    }

    #[test]
    fn inverse_is_bijectively_consistent_with_forward() {
        // Build the inverse the way capabilities_for_code does, then check
        // every (code -> capability) edge maps back to a forward entry that
        // listed it, and vice versa.
        let mut inverse: HashMap<&str, HashSet<Capability>> = HashMap::new();
        for (capability, codes) in FORWARD {
            for code in *codes {
                inverse.entry(code).or_default().insert(*capability);
            }
        }

        for (code, capabilities) in &inverse {
            let derived: HashSet<Capability> =
                capabilities_for_code(&PermissionCode::new(*code)).collect();
            assert_eq!(&derived, capabilities, "inverse drifted for {code}");

            for capability in capabilities {
                assert!(
                    codes_for_capability(*capability).contains(code),
                    "{code} missing from forward entry of {capability:?}"
                );
            }
        }
    }

    #[test]
    fn unknown_codes_are_ignored() {
        let capabilities = to_capabilities(["Nonexistent.Code", "Department.View"]);
        assert_eq!(
            capabilities,
            HashSet::from([Capability::ViewDepartments]),
        );
    }

    #[test]
    fn to_capabilities_unions_over_inputs() {
        let capabilities = to_capabilities(["Department.Create", "Team.View", "Role.Delete"]);
        assert!(capabilities.contains(&Capability::ManageDepartments));
        assert!(capabilities.contains(&Capability::ViewTeams));
        assert!(capabilities.contains(&Capability::ManageRoles));
        assert_eq!(capabilities.len(), 3);
    }

    #[test]
    fn has_any_is_order_insensitive() {
        let user = claims(&["Department.View", "Team.View"]);
        let user_reversed = claims(&["Team.View", "Department.View"]);
        let required = claims(&["Team.View", "Role.View"]);
        let required_reversed = claims(&["Role.View", "Team.View"]);

        assert!(has_any(&user, &required));
        assert!(has_any(&user_reversed, &required));
        assert!(has_any(&user, &required_reversed));
    }

    #[test]
    fn has_any_fails_closed_on_empty_sides() {
        let required = claims(&["Department.View"]);
        assert!(!has_any(&[], &required));
        assert!(!has_any(&required, &[]));
        assert!(!has_any(&[], &[]));
    }

    #[test]
    fn has_any_normalizes_record_shapes_and_whitespace() {
        let user = vec![PermissionClaim::Record {
            code: " Department.View ".to_owned(),
        }];
        let required = claims(&["Department.View"]);
        assert!(has_any(&user, &required));
    }

    #[test]
    fn has_any_is_false_without_intersection() {
        let user = claims(&["Department.View"]);
        let required = claims(&["Department.Create"]);
        assert!(!has_any(&user, &required));
    }
}
