use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{
    OpenApi,
    param::{Path, Query},
    payload::Json,
};
use uuid::Uuid;

use crate::{
    application::context::Context,
    domain::models::{ListFilter, UserLookup},
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags},
        errors::domain_error,
        mappers::{map_new_user, map_update, map_user},
        requests::{CreateUserRequestDto, UpdateUserRequestDto},
        responses::{UserDto, UsersDto},
    },
};

#[derive(Clone)]
pub struct UsersEndpoints {
    state: Arc<ApiState>,
}

impl UsersEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl UsersEndpoints {
    #[oai(path = "/users", method = "post", tag = EndpointsTags::Users)]
    pub async fn create_user(
        &self,
        request: Json<CreateUserRequestDto>,
    ) -> PoemResult<Json<UserDto>> {
        let user = self
            .state
            .user_service
            .create(&Context::background(), map_new_user(request.0))
            .await
            .map_err(domain_error)?;

        Ok(Json(map_user(&user)))
    }

    #[oai(path = "/users", method = "get", tag = EndpointsTags::Users)]
    pub async fn list_users(
        &self,
        page: Query<Option<u64>>,
        limit: Query<Option<u64>>,
        order_by: Query<Option<String>>,
    ) -> PoemResult<Json<UsersDto>> {
        let filter = ListFilter::new(
            page.0.unwrap_or(1),
            limit.0.unwrap_or(0),
            order_by.0.as_deref().unwrap_or_default(),
        )
        .map_err(domain_error)?;

        let users = self
            .state
            .user_service
            .list(&Context::background(), &filter)
            .await
            .map_err(domain_error)?;

        Ok(Json(UsersDto {
            users: users.iter().map(map_user).collect(),
        }))
    }

    #[oai(path = "/users/:id", method = "get", tag = EndpointsTags::Users)]
    pub async fn get_user(&self, id: Path<Uuid>) -> PoemResult<Json<UserDto>> {
        let user = self
            .state
            .user_service
            .get(&Context::background(), UserLookup::ById(id.0))
            .await
            .map_err(domain_error)?;

        Ok(Json(map_user(&user)))
    }

    #[oai(
        path = "/users/by-username/:username",
        method = "get",
        tag = EndpointsTags::Users,
    )]
    pub async fn get_user_by_username(
        &self,
        username: Path<String>,
    ) -> PoemResult<Json<UserDto>> {
        let user = self
            .state
            .user_service
            .get(&Context::background(), UserLookup::ByUsername(username.0))
            .await
            .map_err(domain_error)?;

        Ok(Json(map_user(&user)))
    }

    #[oai(path = "/users/:id", method = "put", tag = EndpointsTags::Users)]
    pub async fn update_user(
        &self,
        id: Path<Uuid>,
        request: Json<UpdateUserRequestDto>,
    ) -> PoemResult<Json<UserDto>> {
        let user = self
            .state
            .user_service
            .update(&Context::background(), map_update(id.0, request.0))
            .await
            .map_err(domain_error)?;

        Ok(Json(map_user(&user)))
    }

    #[oai(path = "/users/:id", method = "delete", tag = EndpointsTags::Users)]
    pub async fn delete_user(&self, id: Path<Uuid>) -> PoemResult<()> {
        self.state
            .user_service
            .delete(&Context::background(), id.0)
            .await
            .map_err(domain_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use poem::{Route, http::StatusCode, test::TestClient};
    use poem_openapi::OpenApiService;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        application::usecases::user::UserService,
        infrastructure::repositories::in_memory::InMemoryUserRepository,
        presentation::http::endpoints::health::HealthEndpoints,
    };

    fn client() -> TestClient<Route> {
        let state = Arc::new(ApiState {
            user_service: Arc::new(UserService::new(
                Arc::new(InMemoryUserRepository::new()),
                Duration::from_secs(5),
            )),
        });
        let api = OpenApiService::new(
            (HealthEndpoints, UsersEndpoints::new(state)),
            "User Service API",
            "0.1.0",
        );
        TestClient::new(Route::new().nest("/api", api))
    }

    async fn json_of(response: poem::test::TestResponse) -> Value {
        response.json().await.value().deserialize::<Value>()
    }

    #[tokio::test]
    async fn user_lifecycle_over_http() {
        let cli = client();
        let supplied_id = Uuid::new_v4();

        let response = cli
            .post("/api/users")
            .body_json(&json!({
                "id": supplied_id,
                "username": "ada",
                "email": "ada@x.io",
                "password": "secret",
            }))
            .send()
            .await;
        response.assert_status_is_ok();
        let created = json_of(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_ne!(id, supplied_id.to_string());
        assert!(created["updated_at"].is_null());
        assert!(created.get("password").is_none());

        let response = cli.get(format!("/api/users/{id}")).send().await;
        response.assert_status_is_ok();
        let fetched = json_of(response).await;
        assert_eq!(fetched["username"], "ada");
        assert_eq!(fetched["email"], "ada@x.io");

        let response = cli
            .put(format!("/api/users/{id}"))
            .body_json(&json!({ "username": "ada2" }))
            .send()
            .await;
        response.assert_status_is_ok();

        let response = cli.get("/api/users/by-username/ada2").send().await;
        response.assert_status_is_ok();
        let updated = json_of(response).await;
        assert_eq!(updated["id"], id.as_str());
        assert!(updated["updated_at"].is_string());

        cli.delete(format!("/api/users/{id}"))
            .send()
            .await
            .assert_status_is_ok();
        cli.get(format!("/api/users/{id}"))
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_rejects_unknown_order_columns() {
        client()
            .get("/api/users")
            .query("order_by", &"password")
            .send()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_pages_results() {
        let cli = client();
        for name in ["carol", "alice", "bob"] {
            cli.post("/api/users")
                .body_json(&json!({ "username": name, "email": format!("{name}@x.io") }))
                .send()
                .await
                .assert_status_is_ok();
        }

        let response = cli
            .get("/api/users")
            .query("page", &2)
            .query("limit", &2)
            .query("order_by", &"username")
            .send()
            .await;
        response.assert_status_is_ok();
        let page = json_of(response).await;
        let users = page["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "carol");
    }

    #[tokio::test]
    async fn paging_far_past_the_end_is_empty() {
        let cli = client();
        cli.post("/api/users")
            .body_json(&json!({ "username": "ada", "email": "ada@x.io" }))
            .send()
            .await
            .assert_status_is_ok();

        let response = cli
            .get("/api/users")
            .query("page", &3)
            .query("limit", &4611686018427387904u64)
            .send()
            .await;
        response.assert_status_is_ok();
        let page = json_of(response).await;
        assert!(page["users"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let cli = client();
        let body = json!({ "username": "ada", "email": "ada@x.io" });
        cli.post("/api/users")
            .body_json(&body)
            .send()
            .await
            .assert_status_is_ok();
        cli.post("/api/users")
            .body_json(&body)
            .send()
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn deleting_a_missing_user_is_not_found() {
        client()
            .delete(format!("/api/users/{}", Uuid::new_v4()))
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = client().get("/api/health").send().await;
        response.assert_status_is_ok();
        response.assert_text("OK").await;
    }
}
