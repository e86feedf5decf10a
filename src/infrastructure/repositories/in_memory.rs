use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    errors::DomainError,
    models::{ListFilter, SortDirection, User, UserLookup, UserUpdate},
    repositories::UserRepository,
};

/// Process-local store with the same observable contract as the Postgres repository.
///
/// Listing without an explicit order returns users in insertion order.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    insertion_order: Arc<RwLock<Vec<Uuid>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(DomainError::Conflict(format!("user id {}", user.id)));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(DomainError::Conflict(format!("username {}", user.username)));
        }

        users.insert(user.id, user.clone());
        self.insertion_order.write().await.push(user.id);
        Ok(user)
    }

    async fn get(&self, lookup: &UserLookup) -> Result<User, DomainError> {
        let users = self.users.read().await;
        users
            .values()
            .find(|u| lookup.matches(u))
            .cloned()
            .ok_or_else(|| DomainError::not_found("User", lookup))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<User>, DomainError> {
        let users = self.users.read().await;
        let order = self.insertion_order.read().await;

        let mut rows: Vec<User> = order
            .iter()
            .filter_map(|id| users.get(id).cloned())
            .collect();

        if !filter.order_by().is_empty() {
            rows.sort_by(|a, b| {
                filter
                    .order_by()
                    .iter()
                    .map(|key| match key.direction {
                        SortDirection::Asc => key.field.compare(a, b),
                        SortDirection::Desc => key.field.compare(b, a),
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset);
        Ok(match filter.limit() {
            0 => rows.collect(),
            limit => rows.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
        })
    }

    async fn update(&self, update: &UserUpdate) -> Result<User, DomainError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.id != update.id && u.username == update.username)
        {
            return Err(DomainError::Conflict(format!(
                "username {}",
                update.username
            )));
        }

        let user = users
            .get_mut(&update.id)
            .ok_or_else(|| DomainError::not_found("User", update.id))?;
        update.apply(user);
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut users = self.users.write().await;
        users
            .remove(&id)
            .ok_or_else(|| DomainError::not_found("User", id))?;
        self.insertion_order.write().await.retain(|existing| *existing != id);
        Ok(())
    }
}
