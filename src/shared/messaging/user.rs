//! User projections
//!
//! Users belong to the identity service. The chat core only reads them, either
//! as the public profile attached to a message or as a directory entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public profile fields joined onto every canonical message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub user_avatar: Option<String>,
}

/// Entry of the user directory (`GET /users`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub user_avatar: Option<String>,
    pub is_online: bool,
    pub lastlogin_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            user_avatar: self.user_avatar.clone(),
        }
    }
}

/// Response of `GET /users`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub success: bool,
    pub users: Vec<User>,
}

/// Directory order: online users first, then by display name.
pub fn directory_order(a: &User, b: &User) -> std::cmp::Ordering {
    b.is_online
        .cmp(&a.is_online)
        .then_with(|| a.name.cmp(&b.name))
}
