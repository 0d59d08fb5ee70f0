use std::fmt;
use std::str::FromStr;

use super::principal::Identity;
use super::role::Role;

/// The guarded views of the club client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Landing,
    Dashboard,
    AdminDashboard,
    AdminProfile,
    CoachDashboard,
    ArcherList,
    ArcherDashboard,
    ArcherProfile,
}

impl Page {
    pub const ALL: [Page; 8] = [
        Page::Landing,
        Page::Dashboard,
        Page::AdminDashboard,
        Page::AdminProfile,
        Page::CoachDashboard,
        Page::ArcherList,
        Page::ArcherDashboard,
        Page::ArcherProfile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Page::Landing => "landing",
            Page::Dashboard => "dashboard",
            Page::AdminDashboard => "admin-dashboard",
            Page::AdminProfile => "admin-profile",
            Page::CoachDashboard => "coach-dashboard",
            Page::ArcherList => "archer-list",
            Page::ArcherDashboard => "archer-dashboard",
            Page::ArcherProfile => "archer-profile",
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        match self {
            Page::Landing | Page::Dashboard => None,
            Page::AdminDashboard | Page::AdminProfile => Some(Role::Admin),
            Page::CoachDashboard | Page::ArcherList => Some(Role::Coach),
            Page::ArcherDashboard | Page::ArcherProfile => Some(Role::Archer),
        }
    }

    /// Login page relative to this page's location in the asset tree.
    pub fn login_target(&self) -> &'static str {
        match self {
            Page::Landing | Page::Dashboard => "login.html",
            Page::AdminDashboard | Page::CoachDashboard | Page::ArcherDashboard => "../login.html",
            Page::AdminProfile | Page::ArcherList | Page::ArcherProfile => "../index.html",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        Page::ALL
            .iter()
            .copied()
            .find(|p| p.name() == key)
            .ok_or_else(|| format!("unknown page '{}'", s))
    }
}

/// Where the landing page sends an authenticated user. Every role shares the
/// unified dashboard, including identities with an unknown role.
pub fn landing_destination(_identity: &Identity) -> &'static str {
    "dashboard.html"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tab {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

const OVERVIEW: Tab = Tab { id: "overview", label: "Overview", icon: "📊" };
const PROFILE: Tab = Tab { id: "profile", label: "Profile", icon: "👤" };
const USERS: Tab = Tab { id: "users", label: "Users", icon: "👥" };
const SESSIONS: Tab = Tab { id: "sessions", label: "Sessions", icon: "📅" };

/// Tabs shown on the unified dashboard for a role.
pub fn dashboard_tabs(role: Option<Role>) -> Vec<Tab> {
    let mut tabs = vec![OVERVIEW, PROFILE];
    if role == Some(Role::Admin) {
        tabs.insert(1, USERS);
    }
    if matches!(role, Some(Role::Coach) | Some(Role::Archer)) {
        let at = tabs.len() - 1;
        tabs.insert(at, SESSIONS);
    }
    tabs
}
