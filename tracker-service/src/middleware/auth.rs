use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    models::User,
    services::{AuthorizationGate, PublicRoutes},
    AppState,
};

/// Router-wide gate. Requests not on the public allow-list must carry a
/// valid bearer token for an active user, including requests to paths with
/// no handler.
pub async fn authorization_gate_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if PublicRoutes::is_public(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let raw_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let user = state.gate.authenticate_and_load_user(raw_header).await?;

    // Handlers read the caller through `AuthUser`
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// The authenticated caller, as loaded by the gate.
pub struct AuthUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<User>()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

        Ok(AuthUser(user.clone()))
    }
}

/// An authenticated caller with the admin role; 403 otherwise.
pub struct AdminUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        AuthorizationGate::require_admin(&user)?;
        Ok(AdminUser(user))
    }
}
