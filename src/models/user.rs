//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Runner,
}

/// Login account stored alongside runners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Store ID (also used as document ID)
    pub id: String,
    pub username: String,
    /// bcrypt hash
    pub password_hash: String,
    pub role: Role,
    /// Current session, if logged in
    #[serde(default)]
    pub session: Option<Session>,
}

/// Opaque session token with a fixed expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.access_token_expiry
    }
}

impl User {
    /// Role carried by `token`, if it is this user's current, unexpired token.
    pub fn role_for_token(&self, token: &str, now: DateTime<Utc>) -> Option<Role> {
        self.session
            .as_ref()
            .filter(|s| s.access_token == token && s.is_valid_at(now))
            .map(|_| self.role)
    }
}
