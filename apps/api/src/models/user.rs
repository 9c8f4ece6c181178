use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl UserRow {
    /// "First Last", or `None` when both parts are blank.
    pub fn full_name(&self) -> Option<String> {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Public projection of a user account. The email doubles as the username.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<&UserRow> for UserView {
    fn from(user: &UserRow) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.email.clone(),
            is_active: user.is_active,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub target_province: Option<String>,
    pub target_city: Option<String>,
    pub planned_arrival_date: Option<NaiveDate>,
    pub current_location: Option<String>,
    pub immigration_status: Option<String>,
    pub language_preference: String,
    pub notification_settings: Value,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    /// Unknown role strings fall back to the least-privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> UserRow {
        UserRow {
            id: 1,
            email: "a@b.ca".into(),
            password_hash: "$argon2id$...".into(),
            first_name: first.into(),
            last_name: last.into(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_joins_parts() {
        assert_eq!(user("Ada", "Lovelace").full_name().as_deref(), Some("Ada Lovelace"));
        assert_eq!(user("Ada", "").full_name().as_deref(), Some("Ada"));
        assert_eq!(user("", "").full_name(), None);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(user("A", "B")).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
