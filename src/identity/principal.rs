use serde_json::Value;

use super::role::Role;

/// A user identity record as served by `/auth/profile`.
///
/// The raw JSON object is kept whole so nothing the server sends is lost when it is
/// cached locally; the role is decoded once up front. A record whose `role` is missing
/// or not one of the known roles is still a valid identity, it just never satisfies a
/// required role.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    role: Option<Role>,
    raw: Value,
}

/// Identity returned by the remote verification call for the current token.
pub type VerifiedIdentity = Identity;
/// Identity cached in local storage under `user_info`.
pub type CachedIdentity = Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityParseError(pub String);

impl std::fmt::Display for IdentityParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid identity record: {}", self.0)
    }
}

impl std::error::Error for IdentityParseError {}

impl Identity {
    /// Build from a bare identity record. The record must be a JSON object.
    pub fn from_record(raw: Value) -> Result<Self, IdentityParseError> {
        if !raw.is_object() {
            return Err(IdentityParseError(format!("expected object, got {}", kind_of(&raw))));
        }
        let role = raw.get("role").and_then(|r| serde_json::from_value::<Role>(r.clone()).ok());
        Ok(Self { role, raw })
    }

    /// Build from a `/auth/profile` response body, which is either the record itself
    /// or the record wrapped as `{ "user": <record> }`.
    pub fn from_response(body: Value) -> Result<Self, IdentityParseError> {
        match body {
            Value::Object(mut map) if map.get("user").map(|u| u.is_object()).unwrap_or(false) => {
                let user = map.remove("user").unwrap_or(Value::Null);
                Self::from_record(user)
            }
            other => Self::from_record(other),
        }
    }

    /// Decode the serialized form kept in local storage.
    pub fn from_storage_str(s: &str) -> Result<Self, IdentityParseError> {
        let v: Value = serde_json::from_str(s).map_err(|e| IdentityParseError(e.to_string()))?;
        Self::from_record(v)
    }

    pub fn to_storage_string(&self) -> String {
        self.raw.to_string()
    }

    pub fn role(&self) -> Option<Role> { self.role }

    pub fn raw(&self) -> &Value { &self.raw }

    pub fn id(&self) -> Option<String> {
        match self.raw.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.raw.get("email").and_then(|v| v.as_str())
    }

    /// Whether this identity may open a page guarded by `required`.
    pub fn satisfies(&self, required: Option<Role>) -> bool {
        match required {
            None => true,
            Some(r) => self.role == Some(r),
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
