//! Frontend capability vocabulary.
//!
//! A [`Capability`] is the coarse-grained permission name the portal UI keys
//! navigation and controls on. Backend permission codes are translated into
//! capabilities through the mapping table in [`crate::mapping`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Coarse-grained frontend capabilities for the workforce portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(EnumIter, EnumString, AsRefStr, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    // Baseline capabilities every authenticated employee holds
    /// Can open the employee dashboard.
    Dashboard,
    /// Can view their own profile page.
    ViewProfile,
    /// Can submit a leave request.
    RequestLeave,
    /// Can view their own leave requests.
    ViewOwnLeave,
    /// Can clock in and out.
    ClockIn,
    /// Can start and end breaks.
    TakeBreak,
    /// Can view their own attendance history.
    ViewOwnAttendance,

    // Elevated capabilities unlocked by issued permission codes or admin role
    /// Can open the administrative dashboard.
    AdminDashboard,
    /// Can view the employee directory.
    ViewEmployees,
    /// Can create, update, and deactivate employees.
    ManageEmployees,
    /// Can view departments.
    ViewDepartments,
    /// Can create, update, and delete departments.
    ManageDepartments,
    /// Can view teams.
    ViewTeams,
    /// Can create, update, and delete teams.
    ManageTeams,
    /// Can view roles and their permission assignments.
    ViewRoles,
    /// Can create, update, and delete roles.
    ManageRoles,
    /// Can view leave requests across the company.
    ViewLeaveRequests,
    /// Can approve and reject leave requests.
    ManageLeaveRequests,
    /// Can view attendance records across the company.
    ViewAttendance,
    /// Can correct attendance records.
    ManageAttendance,
    /// Can change company-wide settings.
    ManageCompanySettings,
}

impl Capability {
    /// Capabilities every authenticated employee holds regardless of issued
    /// permission codes. Custom roles can never drop below this set.
    pub const BASELINE: &[Capability] = &[
        Capability::Dashboard,
        Capability::ViewProfile,
        Capability::RequestLeave,
        Capability::ViewOwnLeave,
        Capability::ClockIn,
        Capability::TakeBreak,
        Capability::ViewOwnAttendance,
    ];

    /// Returns true if this capability is part of the baseline employee set.
    #[must_use]
    pub fn is_baseline(self) -> bool {
        Self::BASELINE.contains(&self)
    }

    /// Returns true if this capability must be unlocked by issued permission
    /// codes or the administrator role.
    #[must_use]
    pub fn is_elevated(self) -> bool {
        !self.is_baseline()
    }

    /// Returns every capability, baseline and elevated.
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }

    /// Returns a human-readable description of the capability.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Dashboard => "Open the employee dashboard",
            Self::ViewProfile => "View own profile",
            Self::RequestLeave => "Submit a leave request",
            Self::ViewOwnLeave => "View own leave requests",
            Self::ClockIn => "Clock in and out",
            Self::TakeBreak => "Start and end breaks",
            Self::ViewOwnAttendance => "View own attendance history",
            Self::AdminDashboard => "Open the administrative dashboard",
            Self::ViewEmployees => "View the employee directory",
            Self::ManageEmployees => "Create, update, and deactivate employees",
            Self::ViewDepartments => "View departments",
            Self::ManageDepartments => "Create, update, and delete departments",
            Self::ViewTeams => "View teams",
            Self::ManageTeams => "Create, update, and delete teams",
            Self::ViewRoles => "View roles and their permission assignments",
            Self::ManageRoles => "Create, update, and delete roles",
            Self::ViewLeaveRequests => "View leave requests across the company",
            Self::ManageLeaveRequests => "Approve and reject leave requests",
            Self::ViewAttendance => "View attendance records across the company",
            Self::ManageAttendance => "Correct attendance records",
            Self::ManageCompanySettings => "Change company-wide settings",
        }
    }
}
