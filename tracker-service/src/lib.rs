pub mod client;
pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{SwaggerMode, TrackerConfig};
use crate::services::{
    AuthService, AuthorizationGate, CredentialValidator, JwtService, OwnershipResolver,
    ResourceService, ResourceStore, TokenService, UserDirectory, UserStore,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::users::get_me,
        handlers::users::update_me,
        handlers::users::change_password,
        handlers::admin::list_users,
        handlers::admin::set_role,
        handlers::admin::set_status,
        handlers::admin::delete_user,
        handlers::projects::list_projects,
        handlers::projects::create_project,
        handlers::projects::get_project,
        handlers::projects::update_project,
        handlers::projects::delete_project,
        handlers::projects::list_project_surfaces,
        handlers::projects::create_project_surface,
        handlers::surfaces::get_surface,
        handlers::surfaces::update_surface,
        handlers::surfaces::delete_surface,
        handlers::surfaces::list_surface_assets,
        handlers::surfaces::create_surface_asset,
        handlers::assets::get_asset,
        handlers::assets::update_asset,
        handlers::assets::delete_asset,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::AuthResponse,
            dtos::users::UpdateProfileRequest,
            dtos::users::ChangePasswordRequest,
            dtos::admin::SetRoleRequest,
            dtos::admin::SetStatusRequest,
            dtos::resources::CreateProjectRequest,
            dtos::resources::UpdateProjectRequest,
            dtos::resources::CreateAttackSurfaceRequest,
            dtos::resources::UpdateAttackSurfaceRequest,
            dtos::resources::CreateAssetRequest,
            dtos::resources::UpdateAssetRequest,
            services::TokenPair,
            models::User,
            models::Role,
            models::Project,
            models::AttackSurface,
            models::SurfaceType,
            models::Asset,
            models::AssetType,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token rotation"),
        (name = "User", description = "Current user's profile"),
        (name = "Admin", description = "User administration"),
        (name = "Projects", description = "Projects owned by the caller"),
        (name = "Attack Surfaces", description = "Attack surfaces within a project"),
        (name = "Assets", description = "Assets within an attack surface"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TrackerConfig>,
    pub users: Arc<dyn UserStore>,
    pub directory: UserDirectory,
    pub gate: AuthorizationGate,
    pub auth_service: AuthService,
    pub resources: ResourceService,
}

impl AppState {
    /// Wire every service over the given stores.
    pub fn new(
        config: TrackerConfig,
        users: Arc<dyn UserStore>,
        resource_store: Arc<dyn ResourceStore>,
    ) -> Self {
        let directory = UserDirectory::new(users.clone());
        let jwt = JwtService::new(&config.jwt);
        let tokens = Arc::new(TokenService::new(jwt, directory.clone()));
        let gate = AuthorizationGate::new(tokens.clone(), directory.clone());
        let auth_service = AuthService::new(
            directory.clone(),
            CredentialValidator::new(directory.clone()),
            tokens,
        );
        let ownership = OwnershipResolver::new(
            resource_store.clone(),
            config.security.allow_owner_reparent,
        );
        let resources = ResourceService::new(resource_store, ownership);

        Self {
            config: Arc::new(config),
            users,
            directory,
            gate,
            auth_service,
            resources,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let mut app = Router::new().route("/health", get(health_check));

    if state.config.swagger.enabled == SwaggerMode::Public {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        // Keep the OpenAPI document available for programmatic clients
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/users/me",
            get(handlers::users::get_me).patch(handlers::users::update_me),
        )
        .route("/users/me/password", post(handlers::users::change_password))
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/users/:id/role", patch(handlers::admin::set_role))
        .route("/admin/users/:id/status", patch(handlers::admin::set_status))
        .route(
            "/admin/users/:id",
            service_core::axum::routing::delete(handlers::admin::delete_user),
        )
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(handlers::projects::get_project)
                .patch(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        .route(
            "/projects/:id/surfaces",
            get(handlers::projects::list_project_surfaces)
                .post(handlers::projects::create_project_surface),
        )
        .route(
            "/surfaces/:id",
            get(handlers::surfaces::get_surface)
                .patch(handlers::surfaces::update_surface)
                .delete(handlers::surfaces::delete_surface),
        )
        .route(
            "/surfaces/:id/assets",
            get(handlers::surfaces::list_surface_assets)
                .post(handlers::surfaces::create_surface_asset),
        )
        .route(
            "/assets/:id",
            get(handlers::assets::get_asset)
                .patch(handlers::assets::update_asset)
                .delete(handlers::assets::delete_asset),
        )
        .with_state(state.clone())
        // Applied with `layer` so unmatched paths are gated too
        .layer(from_fn_with_state(
            state.clone(),
            middleware::authorization_gate_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Ignoring invalid CORS origin '{}': {}", o, e))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Storage is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.users.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Storage health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "storage": "up"
        }
    })))
}
