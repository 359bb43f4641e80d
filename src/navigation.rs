//! Role-based dashboard navigation.

use crate::models::Role;
use crate::models::Role::{Admin, Advisor, Client, FirmAdmin, FirmAdvisor, SuperAdmin};
use serde::Serialize;
use std::fmt;

/// A top-level dashboard section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Dashboard,
    Firms,
    Users,
    Advisors,
    Clients,
    Engagements,
    Tasks,
    Documents,
    Diagnostics,
    Strategies,
    Settings,
}

impl Section {
    pub fn path(&self) -> &'static str {
        match self {
            Section::Dashboard => "/dashboard",
            Section::Firms => "/firms",
            Section::Users => "/users",
            Section::Advisors => "/advisors",
            Section::Clients => "/clients",
            Section::Engagements => "/engagements",
            Section::Tasks => "/tasks",
            Section::Documents => "/documents",
            Section::Diagnostics => "/diagnostics",
            Section::Strategies => "/strategies",
            Section::Settings => "/settings",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Section::Dashboard => "Dashboard",
            Section::Firms => "Firms",
            Section::Users => "Users",
            Section::Advisors => "Advisors",
            Section::Clients => "Clients",
            Section::Engagements => "Engagements",
            Section::Tasks => "Tasks",
            Section::Documents => "Documents",
            Section::Diagnostics => "Diagnostics",
            Section::Strategies => "Strategies",
            Section::Settings => "Settings",
        };
        write!(f, "{}", label)
    }
}

/// Sections in display order, each with the roles allowed to see it.
const NAVIGATION: &[(Section, &[Role])] = &[
    (
        Section::Dashboard,
        &[SuperAdmin, Admin, Advisor, FirmAdmin, FirmAdvisor, Client],
    ),
    (Section::Firms, &[SuperAdmin, Admin]),
    (Section::Users, &[SuperAdmin, Admin]),
    (Section::Advisors, &[SuperAdmin, Admin, FirmAdmin]),
    (
        Section::Clients,
        &[SuperAdmin, Admin, Advisor, FirmAdmin, FirmAdvisor],
    ),
    (
        Section::Engagements,
        &[SuperAdmin, Admin, Advisor, FirmAdmin, FirmAdvisor, Client],
    ),
    (
        Section::Tasks,
        &[Admin, Advisor, FirmAdmin, FirmAdvisor, Client],
    ),
    (
        Section::Documents,
        &[Admin, Advisor, FirmAdmin, FirmAdvisor, Client],
    ),
    (
        Section::Diagnostics,
        &[SuperAdmin, Admin, Advisor, FirmAdmin, FirmAdvisor],
    ),
    (Section::Strategies, &[Advisor, FirmAdmin, FirmAdvisor]),
    (
        Section::Settings,
        &[SuperAdmin, Admin, Advisor, FirmAdmin, FirmAdvisor, Client],
    ),
];

/// Sections visible to `role`, in display order.
pub fn sections_for(role: Role) -> Vec<Section> {
    NAVIGATION
        .iter()
        .filter(|(_, roles)| roles.contains(&role))
        .map(|(section, _)| *section)
        .collect()
}

/// Whether `role` may open `section`.
pub fn can_access(role: Role, section: Section) -> bool {
    NAVIGATION
        .iter()
        .any(|(s, roles)| *s == section && roles.contains(&role))
}
