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
        resources::{CreateAttackSurfaceRequest, CreateProjectRequest, UpdateProjectRequest},
        ErrorResponse,
    },
    middleware::AuthUser,
    models::{AttackSurface, Project},
    utils::ValidatedJson,
    AppState,
};

/// List projects
///
/// Admins see every project; other users see the projects they own.
#[utoipa::path(
    get,
    path = "/projects",
    responses(
        (status = 200, description = "Visible projects", body = Vec<Project>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Projects",
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.resources.list_projects(&user).await?))
}

/// Create a project owned by the caller
#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Projects",
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let project = state.resources.create_project(&user, req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Projects",
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.resources.get_project(project_id, &user).await?))
}

#[utoipa::path(
    patch,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Projects",
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(
        state.resources.update_project(project_id, &user, req).await?,
    ))
}

/// Delete a project with its attack surfaces and assets
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Projects",
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.resources.delete_project(project_id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/projects/{id}/surfaces",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Attack surfaces of the project", body = Vec<AttackSurface>),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Attack Surfaces",
    security(("bearer_auth" = []))
)]
pub async fn list_project_surfaces(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<AttackSurface>>, AppError> {
    Ok(Json(
        state.resources.list_attack_surfaces(project_id, &user).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/surfaces",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CreateAttackSurfaceRequest,
    responses(
        (status = 201, description = "Attack surface created", body = AttackSurface),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Attack Surfaces",
    security(("bearer_auth" = []))
)]
pub async fn create_project_surface(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateAttackSurfaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let surface = state
        .resources
        .create_attack_surface(project_id, &user, req)
        .await?;
    Ok((StatusCode::CREATED, Json(surface)))
}
