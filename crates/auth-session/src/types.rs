//! Session data types shared across the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identity record of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub last_name: String,
}

/// Accepts `42` or `"42"`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(i64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Account creation form.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignupData {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl fmt::Debug for SignupData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupData")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Result of a successful login exchange.
#[derive(Clone)]
pub struct LoginGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Result of a successful refresh exchange.
#[derive(Clone)]
pub struct RefreshGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Where the collaborator UI should go after a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    /// Login screen.
    EntryPage,
    /// Authenticated area.
    Dashboard,
}

impl Navigation {
    pub fn path(&self) -> &'static str {
        match self {
            Navigation::EntryPage => "/",
            Navigation::Dashboard => "/dashboard/dashboard",
        }
    }
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_accepts_numeric_and_string_ids() {
        let numeric: User =
            serde_json::from_value(json!({"id": 7, "username": "bob", "email": "b@x.io"})).unwrap();
        let text: User =
            serde_json::from_value(json!({"id": "7", "username": "bob", "email": "b@x.io"}))
                .unwrap();

        assert_eq!(numeric, text);
        assert_eq!(numeric.first_name, "");
    }

    #[test]
    fn test_user_null_names_become_empty() {
        let user: User = serde_json::from_value(json!({
            "id": 1,
            "username": "bob",
            "email": "b@x.io",
            "first_name": null,
            "last_name": "Builder"
        }))
        .unwrap();

        assert_eq!(user.first_name, "");
        assert_eq!(user.last_name, "Builder");
    }

    #[test]
    fn test_signup_debug_redacts_password() {
        let data = SignupData {
            username: "bob".to_string(),
            password: "hunter2".to_string(),
            email: "b@x.io".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let debug = format!("{:?}", data);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_navigation_paths() {
        assert_eq!(Navigation::EntryPage.path(), "/");
        assert_eq!(Navigation::Dashboard.to_string(), "/dashboard/dashboard");
    }
}
