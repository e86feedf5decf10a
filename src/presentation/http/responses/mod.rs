use poem_openapi::Object;
use uuid::Uuid;

/// Public view of a user. Credentials are never serialized.
#[derive(Object)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub website: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Object)]
pub struct UsersDto {
    pub users: Vec<UserDto>,
}
