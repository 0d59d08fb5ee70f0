use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Club roles. The wire form is the upper-case name used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Coach,
    Archer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Coach, Role::Archer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Coach => "COACH",
            Role::Archer => "ARCHER",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Role::Admin => "👑",
            Role::Coach => "🎯",
            Role::Archer => "🏹",
        }
    }
}

/// Icon for an optional role; unknown or missing roles get the generic user glyph.
pub fn role_icon(role: Option<Role>) -> &'static str {
    role.map(|r| r.icon()).unwrap_or("👤")
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    // Case-insensitive so CLI input like `--role coach` works.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "COACH" => Ok(Role::Coach),
            "ARCHER" => Ok(Role::Archer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_case() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Coach ".parse::<Role>().unwrap(), Role::Coach);
        assert_eq!("ARCHER".parse::<Role>().unwrap(), Role::Archer);
        assert!("judge".parse::<Role>().is_err());
    }

    #[test]
    fn wire_form_is_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Coach).unwrap(), "\"COACH\"");
        let r: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(r, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn icons() {
        assert_eq!(role_icon(Some(Role::Admin)), "👑");
        assert_eq!(role_icon(Some(Role::Archer)), "🏹");
        assert_eq!(role_icon(None), "👤");
    }
}
