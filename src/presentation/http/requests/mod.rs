use poem_openapi::Object;

/// Body of a create call. An `id` sent by the client is not part of the schema and is ignored.
#[derive(Object, Debug)]
pub struct CreateUserRequestDto {
    #[oai(validator(min_length = 1, max_length = 64))]
    pub username: String,
    #[oai(validator(min_length = 3, max_length = 320))]
    pub email: String,
    #[oai(default)]
    pub password: String,
    #[oai(default)]
    pub first_name: String,
    #[oai(default)]
    pub last_name: String,
    #[oai(default)]
    pub bio: String,
    #[oai(default)]
    pub website: String,
    #[oai(default)]
    pub is_active: bool,
    #[oai(default)]
    pub refresh_token: String,
}

#[derive(Object, Debug)]
pub struct UpdateUserRequestDto {
    #[oai(validator(min_length = 1, max_length = 64))]
    pub username: String,
    #[oai(default)]
    pub first_name: String,
    #[oai(default)]
    pub last_name: String,
    #[oai(default)]
    pub bio: String,
    #[oai(default)]
    pub website: String,
    #[oai(default)]
    pub is_active: bool,
}
