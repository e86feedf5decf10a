use uuid::Uuid;

use crate::{
    application::usecases::user::UpdateUserRequest,
    domain::models::{NewUser, User},
    presentation::http::{
        requests::{CreateUserRequestDto, UpdateUserRequestDto},
        responses::UserDto,
    },
};

pub fn map_user(user: &User) -> UserDto {
    UserDto {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        bio: user.bio.clone(),
        website: user.website.clone(),
        is_active: user.is_active,
        created_at: user.created_at.to_rfc3339(),
        updated_at: user.updated_at.map(|at| at.to_rfc3339()),
    }
}

pub fn map_new_user(request: CreateUserRequestDto) -> NewUser {
    NewUser {
        username: request.username,
        email: request.email,
        password: request.password,
        first_name: request.first_name,
        last_name: request.last_name,
        bio: request.bio,
        website: request.website,
        is_active: request.is_active,
        refresh_token: request.refresh_token,
    }
}

pub fn map_update(id: Uuid, request: UpdateUserRequestDto) -> UpdateUserRequest {
    UpdateUserRequest {
        id,
        username: request.username,
        first_name: request.first_name,
        last_name: request.last_name,
        bio: request.bio,
        website: request.website,
        is_active: request.is_active,
    }
}
