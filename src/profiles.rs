//!
//! quiver profiles client
//! ----------------------
//! Profile CRUD and member listing against the club API (`/profiles`, `/profiles/me`).
//! Pages use this after the session guard has let them through. When the API has no
//! profile for the user, or is unreachable, the read paths fall back to placeholder
//! records so a page can still render; a `401` on any call ends the session instead.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::base_url;
use crate::error::{AppError, AppResult};
use crate::identity::session::{self, SessionStore, TOKEN_KEY};
use crate::identity::{Identity, RedirectGate, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileId {
    Num(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A member profile. Fields the client does not know about are carried in `extra`
/// so a load/save cycle does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProfileId>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bow_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_joined: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ProfileUser>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    /// Placeholder shown when the user has no stored profile yet.
    pub fn placeholder(role: Option<Role>) -> Self {
        let mut p = Profile::default();
        if role == Some(Role::Admin) {
            p.department = Some("Administration".to_string());
        }
        p
    }

    pub fn is_archer(&self) -> bool {
        self.user.as_ref().and_then(|u| u.role.as_deref()) == Some(Role::Archer.as_str())
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.email.as_deref())
    }

    /// Year of `date_joined`, accepting either an RFC 3339 timestamp or a plain date.
    pub fn joined_year(&self) -> Option<i32> {
        let raw = self.date_joined.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.year());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(|d| d.year())
    }
}

/// Fixed roster used when the member listing cannot be fetched.
pub fn demo_roster() -> Vec<Profile> {
    let member = |id: i64, first: &str, last: &str, email: &str, school: &str, joined: &str| Profile {
        id: Some(ProfileId::Num(id)),
        first_name: first.to_string(),
        last_name: last.to_string(),
        school_name: Some(school.to_string()),
        date_joined: Some(joined.to_string()),
        user: Some(ProfileUser { email: Some(email.to_string()), role: Some(Role::Archer.as_str().to_string()) }),
        ..Default::default()
    };
    vec![
        member(1, "John", "Doe", "john@example.com", "Archery Academy", "2024-01-15"),
        member(2, "Sarah", "Smith", "sarah@example.com", "Target Sports School", "2024-02-20"),
    ]
}

/// Case-insensitive search over first name, last name, email and school name.
/// An empty term matches everyone.
pub fn filter_members<'a>(members: &'a [Profile], term: &str) -> Vec<&'a Profile> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return members.iter().collect();
    }
    let hit = |s: Option<&str>| s.map(|v| v.to_lowercase().contains(&term)).unwrap_or(false);
    members
        .iter()
        .filter(|m| {
            hit(Some(&m.first_name)) || hit(Some(&m.last_name)) || hit(m.email()) || hit(m.school_name.as_deref())
        })
        .collect()
}

/// Name shown in page headers: profile name, else the email's local part, else `User`.
pub fn display_name(profile: Option<&Profile>, identity: Option<&Identity>) -> String {
    if let Some(p) = profile {
        if !p.first_name.is_empty() {
            return format!("{} {}", p.first_name, p.last_name).trim().to_string();
        }
    }
    identity
        .and_then(|i| i.email())
        .and_then(|e| e.split('@').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("User")
        .to_string()
}

/// Up to two upper-case initials from a display name.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|w| w.chars().next())
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(2)
        .collect()
}

/// Authenticated client for the profile endpoints. Reads the bearer token from the
/// shared session store on every call.
#[derive(Clone)]
pub struct ProfileClient {
    base: Url,
    client: reqwest::Client,
    store: Arc<dyn SessionStore>,
    on_logout: Option<(Arc<RedirectGate>, String)>,
}

impl ProfileClient {
    pub fn new(api_base: &str, store: Arc<dyn SessionStore>) -> AppResult<Self> {
        let base = base_url(api_base, "invalid_api_base")?;
        Ok(Self { base, client: reqwest::Client::new(), store, on_logout: None })
    }

    /// Send the user to `login_target` through `gate` when the API ends the session.
    pub fn with_redirect(mut self, gate: Arc<RedirectGate>, login_target: impl Into<String>) -> Self {
        self.on_logout = Some((gate, login_target.into()));
        self
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Profile>) -> AppResult<reqwest::Response> {
        let token = self
            .store
            .get(TOKEN_KEY)?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::auth("no_token", "not logged in"))?;
        let url = self
            .base
            .join(path)
            .map_err(|e| AppError::internal("url_join".to_string(), e.to_string()))?;
        let mut req = self.client.request(method.clone(), url).bearer_auth(token);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        debug!(target: "quiver::profiles", "{} {} -> {}", method, path, resp.status());
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(target: "quiver::profiles", "token rejected by {}; ending session", path);
            let cleared = session::clear(self.store.as_ref());
            if let Some((gate, target)) = &self.on_logout {
                gate.request(target);
            }
            cleared?;
            return Err(AppError::auth("unauthorized".to_string(), format!("{}: HTTP 401", path)));
        }
        Ok(resp)
    }

    /// `GET /profiles/me`, strictly.
    pub async fn fetch_me(&self) -> AppResult<Profile> {
        let resp = self.send(Method::GET, "profiles/me", None).await?;
        if !resp.status().is_success() {
            return Err(AppError::from_status(resp.status().as_u16(), "/profiles/me"));
        }
        Ok(resp.json().await?)
    }

    /// The current user's profile, or the role's placeholder when none can be loaded.
    /// Only an ended session is reported as an error.
    pub async fn me(&self, role: Option<Role>) -> AppResult<Profile> {
        match self.fetch_me().await {
            Ok(p) => Ok(p),
            Err(e @ AppError::Auth { .. }) => Err(e),
            Err(e) => {
                info!(target: "quiver::profiles", "profile not available ({}), using defaults", e);
                Ok(Profile::placeholder(role))
            }
        }
    }

    /// Send `edited` as an update (`PUT`) when the profile loaded before editing has an id,
    /// otherwise as a create (`POST`). The edit form itself need not carry the id.
    pub async fn save(&self, current_id: Option<&ProfileId>, edited: &Profile) -> AppResult<Profile> {
        let method = if current_id.is_some() { Method::PUT } else { Method::POST };
        let resp = self.send(method, "profiles", Some(edited)).await?;
        if !resp.status().is_success() {
            return Err(AppError::from_status(resp.status().as_u16(), "save profile"));
        }
        let saved: Profile = resp.json().await?;
        info!(target: "quiver::profiles", "profile saved");
        Ok(saved)
    }

    /// `GET /profiles`.
    pub async fn list(&self) -> AppResult<Vec<Profile>> {
        let resp = self.send(Method::GET, "profiles", None).await?;
        if !resp.status().is_success() {
            return Err(AppError::from_status(resp.status().as_u16(), "/profiles"));
        }
        Ok(resp.json().await?)
    }

    /// Archer profiles for the coach's member list, or the demo roster when the listing
    /// cannot be loaded.
    pub async fn archers(&self) -> AppResult<Vec<Profile>> {
        match self.list().await {
            Ok(all) => Ok(all.into_iter().filter(Profile::is_archer).collect()),
            Err(e @ AppError::Auth { .. }) => Err(e),
            Err(e) => {
                warn!(target: "quiver::profiles", "failed to load members ({}), using demo roster", e);
                Ok(demo_roster())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_and_keeps_unknown_fields() {
        let p: Profile = serde_json::from_value(json!({
            "id": 4, "firstName": "Ana", "lastName": "Lee", "schoolName": "North",
            "bowType": "recurve", "user": {"email": "ana@club.org", "role": "ARCHER"},
            "handedness": "left"
        }))
        .unwrap();
        assert_eq!(p.id, Some(ProfileId::Num(4)));
        assert_eq!(p.bow_type.as_deref(), Some("recurve"));
        assert!(p.is_archer());
        assert_eq!(p.extra.get("handedness"), Some(&json!("left")));
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["handedness"], "left");
        assert_eq!(back["firstName"], "Ana");
    }

    #[test]
    fn placeholder_per_role() {
        assert_eq!(Profile::placeholder(Some(Role::Admin)).department.as_deref(), Some("Administration"));
        assert_eq!(Profile::placeholder(Some(Role::Archer)).department, None);
        assert!(Profile::placeholder(None).first_name.is_empty());
    }

    #[test]
    fn joined_year_accepts_dates_and_timestamps() {
        let mut p = Profile::default();
        assert_eq!(p.joined_year(), None);
        p.date_joined = Some("2023-06-01".into());
        assert_eq!(p.joined_year(), Some(2023));
        p.date_joined = Some("2022-12-31T23:00:00Z".into());
        assert_eq!(p.joined_year(), Some(2022));
        p.date_joined = Some("soon".into());
        assert_eq!(p.joined_year(), None);
    }

    #[test]
    fn member_search() {
        let roster = demo_roster();
        assert_eq!(filter_members(&roster, "").len(), 2);
        assert_eq!(filter_members(&roster, "  ").len(), 2);
        assert_eq!(filter_members(&roster, "SARAH")[0].last_name, "Smith");
        assert_eq!(filter_members(&roster, "academy")[0].first_name, "John");
        assert_eq!(filter_members(&roster, "john@").len(), 1);
        assert!(filter_members(&roster, "zzz").is_empty());
    }

    #[test]
    fn names_and_initials() {
        let mut p = Profile::default();
        let id = Identity::from_record(json!({"email": "robin@hood.org"})).unwrap();
        assert_eq!(display_name(Some(&p), Some(&id)), "robin");
        assert_eq!(display_name(None, None), "User");
        p.first_name = "Robin".into();
        assert_eq!(display_name(Some(&p), Some(&id)), "Robin");
        p.last_name = "of Locksley".into();
        assert_eq!(display_name(Some(&p), None), "Robin of Locksley");
        assert_eq!(initials("Robin of Locksley"), "RO");
        assert_eq!(initials("robin"), "R");
        assert_eq!(initials(""), "");
    }
}
