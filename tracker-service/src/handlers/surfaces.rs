use service_core::{
    axum::{
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::{
    dtos::{
        resources::{CreateAssetRequest, UpdateAttackSurfaceRequest},
        ErrorResponse,
    },
    middleware::AuthUser,
    models::{Asset, AttackSurface},
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/surfaces/{id}",
    params(("id" = Uuid, Path, description = "Attack surface id")),
    responses(
        (status = 200, description = "Attack surface", body = AttackSurface),
        (status = 403, description = "Not the project owner", body = ErrorResponse),
        (status = 404, description = "Attack surface not found", body = ErrorResponse)
    ),
    tag = "Attack Surfaces",
    security(("bearer_auth" = []))
)]
pub async fn get_surface(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(surface_id): Path<Uuid>,
) -> Result<Json<AttackSurface>, AppError> {
    Ok(Json(
        state.resources.get_attack_surface(surface_id, &user).await?,
    ))
}

/// Update an attack surface
///
/// Setting `project_id` to another project moves the surface. Both projects
/// must pass the ownership check, and the move needs the admin role unless
/// owner re-parenting is enabled.
#[utoipa::path(
    patch,
    path = "/surfaces/{id}",
    params(("id" = Uuid, Path, description = "Attack surface id")),
    request_body = UpdateAttackSurfaceRequest,
    responses(
        (status = 200, description = "Attack surface updated", body = AttackSurface),
        (status = 403, description = "Ownership or re-parent check failed", body = ErrorResponse),
        (status = 404, description = "Attack surface or project not found", body = ErrorResponse)
    ),
    tag = "Attack Surfaces",
    security(("bearer_auth" = []))
)]
pub async fn update_surface(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(surface_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateAttackSurfaceRequest>,
) -> Result<Json<AttackSurface>, AppError> {
    Ok(Json(
        state
            .resources
            .update_attack_surface(surface_id, &user, req)
            .await?,
    ))
}

/// Delete an attack surface and its assets
#[utoipa::path(
    delete,
    path = "/surfaces/{id}",
    params(("id" = Uuid, Path, description = "Attack surface id")),
    responses(
        (status = 204, description = "Attack surface deleted"),
        (status = 403, description = "Not the project owner", body = ErrorResponse),
        (status = 404, description = "Attack surface not found", body = ErrorResponse)
    ),
    tag = "Attack Surfaces",
    security(("bearer_auth" = []))
)]
pub async fn delete_surface(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(surface_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .resources
        .delete_attack_surface(surface_id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/surfaces/{id}/assets",
    params(("id" = Uuid, Path, description = "Attack surface id")),
    responses(
        (status = 200, description = "Assets of the attack surface", body = Vec<Asset>),
        (status = 403, description = "Not the project owner", body = ErrorResponse),
        (status = 404, description = "Attack surface not found", body = ErrorResponse)
    ),
    tag = "Assets",
    security(("bearer_auth" = []))
)]
pub async fn list_surface_assets(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(surface_id): Path<Uuid>,
) -> Result<Json<Vec<Asset>>, AppError> {
    Ok(Json(state.resources.list_assets(surface_id, &user).await?))
}

#[utoipa::path(
    post,
    path = "/surfaces/{id}/assets",
    params(("id" = Uuid, Path, description = "Attack surface id")),
    request_body = CreateAssetRequest,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 403, description = "Not the project owner", body = ErrorResponse),
        (status = 404, description = "Attack surface not found", body = ErrorResponse)
    ),
    tag = "Assets",
    security(("bearer_auth" = []))
)]
pub async fn create_surface_asset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(surface_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateAssetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let asset = state.resources.create_asset(surface_id, &user, req).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}
