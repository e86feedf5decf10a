use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub website: String,
    pub is_active: bool,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Caller-supplied fields of a user that does not exist yet.
///
/// Identity and timestamps are not part of it: they are assigned when the user is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub website: String,
    pub is_active: bool,
    pub refresh_token: String,
}

impl NewUser {
    pub fn into_user(self, id: Uuid, created_at: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            website: self.website,
            is_active: self.is_active,
            refresh_token: self.refresh_token,
            created_at,
            updated_at: None,
        }
    }
}

/// Mutable fields of an existing user. `updated_at` is stamped by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub website: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl UserUpdate {
    pub fn apply(&self, user: &mut User) {
        user.username = self.username.clone();
        user.first_name = self.first_name.clone();
        user.last_name = self.last_name.clone();
        user.bio = self.bio.clone();
        user.website = self.website.clone();
        user.is_active = self.is_active;
        user.updated_at = Some(self.updated_at);
    }
}

/// Supported single-record lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    ById(Uuid),
    ByUsername(String),
}

impl UserLookup {
    pub fn matches(&self, user: &User) -> bool {
        match self {
            UserLookup::ById(id) => user.id == *id,
            UserLookup::ByUsername(username) => user.username == *username,
        }
    }
}

impl std::fmt::Display for UserLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserLookup::ById(id) => write!(f, "id={id}"),
            UserLookup::ByUsername(username) => write!(f, "username={username}"),
        }
    }
}
