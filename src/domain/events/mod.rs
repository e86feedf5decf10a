use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{errors::DomainError, models::NewUser};

/// Canonical payload of a user-creation event.
///
/// `id` is tolerated for producers that send one but never used: the service assigns identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCreatedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub refresh_token: String,
}

impl UserCreatedEvent {
    pub fn decode(payload: &[u8]) -> Result<Self, DomainError> {
        let event: Self = serde_json::from_slice(payload)
            .map_err(|err| DomainError::invalid(format!("malformed user event: {err}")))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.username.trim().is_empty() {
            return Err(DomainError::invalid("user event without username"));
        }
        if self.email.trim().is_empty() {
            return Err(DomainError::invalid("user event without email"));
        }
        Ok(())
    }
}

impl From<UserCreatedEvent> for NewUser {
    fn from(event: UserCreatedEvent) -> Self {
        Self {
            username: event.username,
            email: event.email,
            password: event.password,
            first_name: event.first_name,
            last_name: event.last_name,
            bio: event.bio,
            website: event.website,
            is_active: event.is_active,
            refresh_token: event.refresh_token,
        }
    }
}
