use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    errors::DomainError,
    models::{ListFilter, User, UserLookup, UserUpdate},
};

/// Storage access for user records. Every method is a single statement; cancelling the
/// returned future abandons the statement.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, DomainError>;
    async fn get(&self, lookup: &UserLookup) -> Result<User, DomainError>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<User>, DomainError>;
    /// Fails with `NotFound` when no row has the given id.
    async fn update(&self, update: &UserUpdate) -> Result<User, DomainError>;
    /// Fails with `NotFound` when no row has the given id.
    async fn delete(&self, id: Uuid) -> Result<(), DomainError>;
}
