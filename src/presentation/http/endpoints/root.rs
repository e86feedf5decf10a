use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::usecases::user::UserService;

#[derive(Clone)]
pub struct ApiState {
    pub user_service: Arc<UserService>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Users,
}
