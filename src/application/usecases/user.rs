use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    application::context::Context,
    domain::{
        errors::DomainError,
        models::{ListFilter, NewUser, User, UserLookup, UserUpdate},
        repositories::UserRepository,
    },
};

/// Request for [`UserService::update`]. Every mutable field is replaced.
pub struct UpdateUserRequest {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub website: String,
    pub is_active: bool,
}

/// User use-cases shared by the HTTP endpoints and the event consumer.
///
/// Every call runs in a sub-context of the caller's, capped at `timeout`, and identity plus
/// timestamps are only ever assigned here.
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    timeout: Duration,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    #[instrument(skip_all, fields(user_id))]
    pub async fn create(&self, ctx: &Context, request: NewUser) -> Result<User, DomainError> {
        let ctx = ctx.with_timeout(self.timeout);

        require("username", &request.username)?;
        require("email", &request.email)?;

        let user = request.into_user(Uuid::new_v4(), Utc::now());
        tracing::Span::current().record("user_id", user.id.to_string());

        ctx.run(self.repo.create(user)).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &Context, lookup: UserLookup) -> Result<User, DomainError> {
        let ctx = ctx.with_timeout(self.timeout);
        ctx.run(self.repo.get(&lookup)).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &Context, filter: &ListFilter) -> Result<Vec<User>, DomainError> {
        let ctx = ctx.with_timeout(self.timeout);
        ctx.run(self.repo.list(filter)).await
    }

    #[instrument(skip_all, fields(user_id = %request.id))]
    pub async fn update(
        &self,
        ctx: &Context,
        request: UpdateUserRequest,
    ) -> Result<User, DomainError> {
        let ctx = ctx.with_timeout(self.timeout);

        require("username", &request.username)?;

        let update = UserUpdate {
            id: request.id,
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
            bio: request.bio,
            website: request.website,
            is_active: request.is_active,
            updated_at: Utc::now(),
        };

        ctx.run(self.repo.update(&update)).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &Context, id: Uuid) -> Result<(), DomainError> {
        let ctx = ctx.with_timeout(self.timeout);
        ctx.run(self.repo.delete(id)).await
    }
}

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::infrastructure::repositories::in_memory::InMemoryUserRepository;

    fn service() -> UserService {
        UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Duration::from_secs(5),
        )
    }

    fn ada() -> NewUser {
        NewUser {
            username: "ada".to_string(),
            email: "ada@x.io".to_string(),
            password: "secret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            ..NewUser::default()
        }
    }

    fn update_of(user: &User, username: &str) -> UpdateUserRequest {
        UpdateUserRequest {
            id: user.id,
            username: username.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            bio: "analyst".to_string(),
            website: user.website.clone(),
            is_active: true,
        }
    }

    /// Repository whose calls never finish in time.
    struct StalledRepository;

    #[async_trait]
    impl UserRepository for StalledRepository {
        async fn create(&self, user: User) -> Result<User, DomainError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(user)
        }

        async fn get(&self, lookup: &UserLookup) -> Result<User, DomainError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(DomainError::not_found("User", lookup))
        }

        async fn list(&self, _filter: &ListFilter) -> Result<Vec<User>, DomainError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn update(&self, update: &UserUpdate) -> Result<User, DomainError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(DomainError::not_found("User", update.id))
        }

        async fn delete(&self, _id: Uuid) -> Result<(), DomainError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_assigns_identity_and_creation_time() {
        let service = service();
        let ctx = Context::background();

        let first = service.create(&ctx, ada()).await.unwrap();
        let mut second_request = ada();
        second_request.username = "ada-two".to_string();
        let second = service.create(&ctx, second_request).await.unwrap();

        assert!(!first.id.is_nil());
        assert_ne!(first.id, second.id);
        assert!(first.updated_at.is_none());
        assert!(first.created_at <= Utc::now());
    }

    #[tokio::test]
    async fn created_user_round_trips_through_get() {
        let service = service();
        let ctx = Context::background();

        let created = service.create(&ctx, ada()).await.unwrap();
        let fetched = service
            .get(&ctx, UserLookup::ById(created.id))
            .await
            .unwrap();
        assert_eq!(fetched, created);

        let by_name = service
            .get(&ctx, UserLookup::ByUsername("ada".to_string()))
            .await
            .unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn create_rejects_blank_username() {
        let service = service();
        let mut request = ada();
        request.username = "  ".to_string();

        let err = service
            .create(&Context::background(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn update_then_delete_lifecycle() {
        let service = service();
        let ctx = Context::background();

        let created = service.create(&ctx, ada()).await.unwrap();
        let updated = service
            .update(&ctx, update_of(&created, "ada2"))
            .await
            .unwrap();
        assert_eq!(updated.username, "ada2");
        assert_eq!(updated.email, "ada@x.io");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at.unwrap() >= created.created_at);

        let fetched = service
            .get(&ctx, UserLookup::ById(created.id))
            .await
            .unwrap();
        assert_eq!(fetched.username, "ada2");
        assert!(fetched.updated_at.is_some());

        service.delete(&ctx, created.id).await.unwrap();
        let err = service
            .get(&ctx, UserLookup::ById(created.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_of_missing_user_is_not_found_and_changes_nothing() {
        let service = service();
        let ctx = Context::background();
        let created = service.create(&ctx, ada()).await.unwrap();

        let mut ghost = update_of(&created, "ghost");
        ghost.id = Uuid::new_v4();
        let err = service.update(&ctx, ghost).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let all = service.list(&ctx, &ListFilter::default()).await.unwrap();
        assert_eq!(all, vec![created]);
    }

    #[tokio::test]
    async fn delete_of_missing_user_is_not_found() {
        let err = service()
            .delete(&Context::background(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_pages_in_requested_order() {
        let service = service();
        let ctx = Context::background();
        for name in ["carol", "alice", "dave", "bob", "erin"] {
            let mut request = ada();
            request.username = name.to_string();
            service.create(&ctx, request).await.unwrap();
        }

        let names = |users: Vec<User>| -> Vec<String> {
            users.into_iter().map(|user| user.username).collect()
        };

        let everything = ListFilter::new(1, 0, "username").unwrap();
        assert_eq!(
            names(service.list(&ctx, &everything).await.unwrap()),
            ["alice", "bob", "carol", "dave", "erin"]
        );

        let second_page = ListFilter::new(2, 2, "username desc").unwrap();
        assert_eq!(
            names(service.list(&ctx, &second_page).await.unwrap()),
            ["carol", "bob"]
        );

        let past_the_end = ListFilter::new(4, 2, "username").unwrap();
        assert!(service.list(&ctx, &past_the_end).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_store_yields_deadline_exceeded() {
        let service = UserService::new(Arc::new(StalledRepository), Duration::from_millis(20));
        let ctx = Context::background();

        let err = service.create(&ctx, ada()).await.unwrap_err();
        assert!(matches!(err, DomainError::DeadlineExceeded));

        let err = service.delete(&ctx, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancelled_caller_fails_fast() {
        let service = UserService::new(Arc::new(StalledRepository), Duration::from_secs(60));
        let ctx = Context::background();
        ctx.cancel();

        let err = service
            .get(&ctx, UserLookup::ById(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Cancelled));
    }
}
