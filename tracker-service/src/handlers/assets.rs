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
    dtos::{resources::UpdateAssetRequest, ErrorResponse},
    middleware::AuthUser,
    models::Asset,
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 403, description = "Not the project owner", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    ),
    tag = "Assets",
    security(("bearer_auth" = []))
)]
pub async fn get_asset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(asset_id): Path<Uuid>,
) -> Result<Json<Asset>, AppError> {
    Ok(Json(state.resources.get_asset(asset_id, &user).await?))
}

/// Update an asset
///
/// Setting `attack_surface_id` to another surface moves the asset under the
/// same rules as moving a surface.
#[utoipa::path(
    patch,
    path = "/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset id")),
    request_body = UpdateAssetRequest,
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 403, description = "Ownership or re-parent check failed", body = ErrorResponse),
        (status = 404, description = "Asset or attack surface not found", body = ErrorResponse)
    ),
    tag = "Assets",
    security(("bearer_auth" = []))
)]
pub async fn update_asset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(asset_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateAssetRequest>,
) -> Result<Json<Asset>, AppError> {
    Ok(Json(
        state.resources.update_asset(asset_id, &user, req).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 403, description = "Not the project owner", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    ),
    tag = "Assets",
    security(("bearer_auth" = []))
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(asset_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.resources.delete_asset(asset_id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
