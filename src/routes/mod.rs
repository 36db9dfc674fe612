//! Route and tab resolution.
//!
//! Maps a path such as `/admin/approvals` to the navigation section it
//! belongs to and the title shown for it. Also holds the per-role navigation
//! table, so every caller dispatches on [`Role`] in one place.

use std::fmt;

use crate::models::Role;

pub const LOGIN_PATH: &str = "/";
pub const SETTINGS_PATH: &str = "/settings";

/// A navigation section. Keys the client does not know are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Section {
    Dashboard,
    Settings,
    Rides,
    Request,
    Vehicle,
    Earnings,
    AvailableRides,
    Approvals,
    Users,
    Analytics,
    Students,
    Drivers,
    Help,
    Other(String),
}

impl Section {
    pub fn from_key(key: &str) -> Section {
        match key {
            "" | "dashboard" => Section::Dashboard,
            "settings" => Section::Settings,
            "rides" => Section::Rides,
            "request" => Section::Request,
            "vehicle" => Section::Vehicle,
            "earnings" => Section::Earnings,
            "available-rides" => Section::AvailableRides,
            "approvals" => Section::Approvals,
            "users" => Section::Users,
            "analytics" => Section::Analytics,
            "students" => Section::Students,
            "drivers" => Section::Drivers,
            "help" => Section::Help,
            other => Section::Other(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Settings => "settings",
            Section::Rides => "rides",
            Section::Request => "request",
            Section::Vehicle => "vehicle",
            Section::Earnings => "earnings",
            Section::AvailableRides => "available-rides",
            Section::Approvals => "approvals",
            Section::Users => "users",
            Section::Analytics => "analytics",
            Section::Students => "students",
            Section::Drivers => "drivers",
            Section::Help => "help",
            Section::Other(key) => key,
        }
    }

    /// Page title for this section, given the role whose area it sits in.
    pub fn title(&self, role: Role) -> &'static str {
        match (self, role) {
            (Section::Dashboard, _) => "Dashboard",
            (Section::Settings, _) => "Settings",
            (Section::Rides, Role::Admin) => "Rides Log",
            (Section::Rides, _) => "My Rides",
            (Section::Request, Role::Student) => "Request Ride",
            (Section::Vehicle, Role::Driver) => "Vehicle",
            (Section::Earnings, Role::Driver) => "Earnings",
            (Section::AvailableRides, Role::Driver) => "Available Rides",
            (Section::Approvals, Role::Admin) => "User Approvals",
            (Section::Users, Role::Admin) => "Users",
            (Section::Analytics, Role::Admin) => "Analytics",
            (Section::Students, Role::Admin) => "Students",
            (Section::Drivers, Role::Admin) => "Drivers",
            (Section::Help, Role::Admin) => "Help",
            _ => role.panel_label(),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Result of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub section: Section,
    pub label: &'static str,
}

/// Whether the path addresses the self-service settings page.
pub fn is_settings_path(path: &str) -> bool {
    path.contains(SETTINGS_PATH)
}

/// Resolve `path` to a section and label for a user of `role`.
///
/// Total: any input yields a resolution. `/settings` anywhere in the path wins.
/// Otherwise the first segment names the area (normally a role) and the second
/// is the section key; a path with no second segment is the dashboard.
pub fn resolve(path: &str, role: Role) -> Resolution {
    let section = if is_settings_path(path) {
        Section::Settings
    } else {
        let key = path.split('/').filter(|s| !s.is_empty()).nth(1);
        Section::from_key(key.unwrap_or(""))
    };
    let label = section.title(role);
    Resolution { section, label }
}

/// The role whose area `path` lies in, if any.
pub fn role_of_path(path: &str) -> Option<Role> {
    path.split('/')
        .find(|s| !s.is_empty())
        .and_then(Role::from_segment)
}

/// One entry in a role's navigation bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub section: Section,
    pub label: &'static str,
}

fn item(section: Section, label: &'static str) -> NavItem {
    NavItem { section, label }
}

/// Navigation bar for a role, in display order.
pub fn nav_items(role: Role) -> Vec<NavItem> {
    match role {
        Role::Student => vec![
            item(Section::Dashboard, "Dashboard"),
            item(Section::Rides, "My Rides"),
            item(Section::Request, "Request Ride"),
            item(Section::Settings, "Settings"),
        ],
        Role::Driver => vec![
            item(Section::Dashboard, "Dashboard"),
            item(Section::Rides, "My Rides"),
            item(Section::Vehicle, "Vehicle"),
            item(Section::Earnings, "Earnings"),
            item(Section::Settings, "Settings"),
        ],
        Role::Admin => vec![
            item(Section::Dashboard, "Dashboard"),
            item(Section::Approvals, "Pending Approvals"),
            item(Section::Users, "Users"),
            item(Section::Rides, "Rides Log"),
            item(Section::Analytics, "Analytics"),
            item(Section::Settings, "Settings"),
        ],
    }
}

/// Path that a navigation section leads to for `role`.
pub fn path_for(role: Role, section: &Section) -> String {
    match section {
        Section::Settings => SETTINGS_PATH.to_string(),
        Section::Dashboard => role.home_path(),
        other => format!("{}/{}", role.home_path(), other.key()),
    }
}
