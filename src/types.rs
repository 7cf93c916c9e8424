use derive_more::{From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which of the two parallel API surfaces (and UI trees) a session uses.
///
/// Serialized as `"client"` / `"admin"`, which is also the value kept in
/// durable storage. Use `"admin".parse::<Role>()` to read it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

/// Fixed pair of backend endpoints serving one [`Role`].
///
/// Paths are relative to the configured API base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub login: &'static str,
    pub profile: &'static str,
}

const CLIENT_ENDPOINTS: Endpoints = Endpoints {
    login: "/auth/login",
    profile: "/auth/me",
};

const ADMIN_ENDPOINTS: Endpoints = Endpoints {
    login: "/admin/auth/login",
    profile: "/admin/auth/me",
};

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }

    /// Login and profile endpoints for this role.
    #[must_use]
    pub const fn endpoints(self) -> Endpoints {
        match self {
            Self::Client => CLIENT_ENDPOINTS,
            Self::Admin => ADMIN_ENDPOINTS,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            other => Err(Error::InvalidRole(other.to_owned())),
        }
    }
}

/// Opaque bearer token issued by a login endpoint.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Profile returned by `/auth/me` or `/admin/auth/me`.
///
/// Read-only from the portal's point of view: known fields are surfaced for
/// display, everything else the backend sends is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Best label for display: name, then email, then id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_storage_values() {
        assert_eq!("client".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn role_rejects_unknown_values() {
        assert!("Admin".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn role_display_matches_storage_value() {
        for role in [Role::Client, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let parsed: Role = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(parsed, Role::Client);
    }

    #[test]
    fn each_role_has_its_own_endpoints() {
        assert_eq!(Role::Client.endpoints().login, "/auth/login");
        assert_eq!(Role::Client.endpoints().profile, "/auth/me");
        assert_eq!(Role::Admin.endpoints().login, "/admin/auth/login");
        assert_eq!(Role::Admin.endpoints().profile, "/admin/auth/me");
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::from("secret-jwt");
        assert!(!format!("{token:?}").contains("secret-jwt"));
        assert_eq!(token.as_str(), "secret-jwt");
    }

    #[test]
    fn profile_keeps_unknown_fields() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id":"c1","name":"Demo Client","email":"demo@take2studio.com",
                "created_at":"2025-01-01T00:00:00","plan":"gold"}"#,
        )
        .unwrap();

        assert_eq!(profile.name.as_deref(), Some("Demo Client"));
        assert_eq!(profile.created_at.as_deref(), Some("2025-01-01T00:00:00"));
        assert_eq!(profile.extra.get("plan").and_then(|v| v.as_str()), Some("gold"));
    }

    #[test]
    fn profile_display_name_falls_back() {
        assert_eq!(UserProfile::new().with_name("Ana").display_name(), "Ana");
        assert_eq!(UserProfile::new().with_email("a@b.c").display_name(), "a@b.c");
        assert_eq!(UserProfile::new().display_name(), "unknown");
    }
}
