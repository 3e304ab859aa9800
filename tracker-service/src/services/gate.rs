//! Authentication and the public-route allow-list.

use axum::http::Method;
use std::sync::Arc;

use crate::models::User;
use crate::services::{AccessTokenClaims, ServiceError, TokenService, UserDirectory};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy)]
enum PathMatch {
    Exact(&'static str),
    /// The path itself or anything below it.
    Prefix(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct PublicRoute {
    method: &'static str,
    path: PathMatch,
}

impl PublicRoute {
    const fn exact(method: &'static str, path: &'static str) -> Self {
        Self {
            method,
            path: PathMatch::Exact(path),
        }
    }

    const fn prefix(method: &'static str, path: &'static str) -> Self {
        Self {
            method,
            path: PathMatch::Prefix(path),
        }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        if method.as_str() != self.method {
            return false;
        }
        match self.path {
            PathMatch::Exact(p) => path == p,
            PathMatch::Prefix(p) => {
                path == p || path.strip_prefix(p).is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Every route reachable without a bearer token. Anything not listed here is
/// authenticated, including paths with no handler.
pub struct PublicRoutes;

impl PublicRoutes {
    pub const ROUTES: &'static [PublicRoute] = &[
        PublicRoute::exact("POST", "/auth/login"),
        PublicRoute::exact("POST", "/auth/register"),
        PublicRoute::exact("POST", "/auth/refresh"),
        PublicRoute::exact("GET", "/health"),
        PublicRoute::prefix("GET", "/docs"),
        PublicRoute::exact("GET", "/.well-known/openapi.json"),
    ];

    pub fn is_public(method: &Method, path: &str) -> bool {
        Self::ROUTES.iter().any(|route| route.matches(method, path))
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    tokens: Arc<TokenService>,
    directory: UserDirectory,
}

impl AuthorizationGate {
    pub fn new(tokens: Arc<TokenService>, directory: UserDirectory) -> Self {
        Self { tokens, directory }
    }

    /// Verify the `Authorization` header value. Only the exact `Bearer `
    /// scheme is accepted.
    pub fn authenticate(&self, raw_header: Option<&str>) -> Result<AccessTokenClaims, ServiceError> {
        let token = raw_header
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .filter(|token| !token.is_empty())
            .ok_or(ServiceError::Unauthorized)?;

        self.tokens
            .verify_access_token(token)
            .map_err(|_| ServiceError::Unauthorized)
    }

    /// As [`authenticate`](Self::authenticate), then resolve the subject to
    /// a current, active user.
    pub async fn authenticate_and_load_user(
        &self,
        raw_header: Option<&str>,
    ) -> Result<User, ServiceError> {
        let claims = self.authenticate(raw_header)?;

        let user = self
            .directory
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.sub, "Token subject no longer exists");
                ServiceError::Unauthorized
            })?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Token presented for inactive user");
            return Err(ServiceError::Unauthorized);
        }

        Ok(user)
    }

    pub fn require_admin(user: &User) -> Result<(), ServiceError> {
        if user.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %user.id, "Admin route denied");
            Err(ServiceError::Forbidden)
        }
    }
}
