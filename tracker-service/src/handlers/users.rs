use secrecy::Secret;
use service_core::{
    axum::{extract::State, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::{
        users::{ChangePasswordRequest, UpdateProfileRequest},
        ErrorResponse, MessageResponse,
    },
    middleware::AuthUser,
    models::User,
    utils::ValidatedJson,
    AppState,
};

/// Current user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

/// Update email and/or display name
///
/// Any other field, including `role`, `is_active` and password fields, is
/// rejected with 400.
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Protected or unknown field", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(fields): Json<serde_json::Value>,
) -> Result<Json<User>, AppError> {
    let updated = state.directory.update(user.id, fields).await?;
    Ok(Json(updated))
}

/// Change password
///
/// Revokes the current refresh token; the client must log in again to get a
/// new one.
#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password incorrect", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .directory
        .change_password(
            user.id,
            Secret::new(req.current_password),
            Secret::new(req.new_password),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed".to_string(),
    }))
}
