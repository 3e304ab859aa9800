use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Documented shape of `PATCH /users/me`. The handler takes the raw JSON so
/// protected fields can be named in the rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[schema(example = "new@example.com")]
    pub email: Option<String>,
    #[schema(example = "Alice", max_length = 100)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}
