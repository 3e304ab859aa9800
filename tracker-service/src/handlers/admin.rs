use service_core::{
    axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::{
    dtos::{
        admin::{SetRoleRequest, SetStatusRequest},
        ErrorResponse,
    },
    middleware::AdminUser,
    models::User,
    utils::ValidatedJson,
    AppState,
};

/// List all users
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.directory.list().await?))
}

/// Change a user's role
#[utoipa::path(
    patch,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SetRoleRequest>,
) -> Result<Json<User>, AppError> {
    let user = state.directory.set_role(user_id, req.role).await?;
    tracing::info!(admin_id = %admin.id, user_id = %user_id, "Admin changed user role");
    Ok(Json(user))
}

/// Activate or deactivate a user
///
/// Deactivation revokes the user's refresh token and makes their access
/// tokens fail at the gate.
#[utoipa::path(
    patch,
    path = "/admin/users/{id}/status",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = User),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn set_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SetStatusRequest>,
) -> Result<Json<User>, AppError> {
    let user = state.directory.set_active(user_id, req.is_active).await?;
    tracing::info!(admin_id = %admin.id, user_id = %user_id, is_active = req.is_active, "Admin changed user status");
    Ok(Json(user))
}

/// Delete a user and everything they own
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.directory.delete(user_id).await?;
    tracing::info!(admin_id = %admin.id, user_id = %user_id, "Admin deleted user");
    Ok(StatusCode::NO_CONTENT)
}
