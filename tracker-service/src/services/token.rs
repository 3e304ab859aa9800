//! Token issuance, verification and refresh-token rotation.
//!
//! Each refresh token moves `Issued -> Consumed | Expired`. A token is
//! consumed when it is rotated out, revoked, or superseded by a newer
//! issuance; only the digest stored on the user row is ever accepted.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::User;
use crate::services::keyed_lock::KeyedMutex;
use crate::services::{AccessTokenClaims, JwtService, ServiceError, UserDirectory};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds.
    #[schema(example = 900)]
    pub expires_in: i64,
}

pub struct TokenService {
    jwt: JwtService,
    directory: UserDirectory,
    refresh_locks: KeyedMutex<Uuid>,
}

impl TokenService {
    pub fn new(jwt: JwtService, directory: UserDirectory) -> Self {
        Self {
            jwt,
            directory,
            refresh_locks: KeyedMutex::new(),
        }
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, ServiceError> {
        Ok(self.jwt.generate_access_token(user)?)
    }

    /// Persists the new token, overwriting (and so invalidating) any earlier
    /// one for this user.
    pub async fn issue_refresh_token(&self, user: &User) -> Result<String, ServiceError> {
        let token = self.jwt.generate_refresh_token(user.id)?;

        if !self.directory.set_refresh_token(user.id, Some(&token)).await? {
            return Err(ServiceError::NotFound("User"));
        }

        Ok(token)
    }

    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair, ServiceError> {
        let access_token = self.issue_access_token(user)?;
        let refresh_token = self.issue_refresh_token(user).await?;

        Ok(self.pair(access_token, refresh_token))
    }

    /// Stateless: signature, algorithm and expiry only.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        self.jwt.validate_access_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            ServiceError::InvalidToken
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// consumed; of several concurrent calls with the same token at most one
    /// succeeds.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, ServiceError> {
        let claims = self.jwt.validate_refresh_token(presented).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            ServiceError::InvalidRefreshToken
        })?;

        let _guard = self.refresh_locks.lock(claims.sub).await;

        let user = self
            .directory
            .find_by_stored_refresh_token(presented)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.sub, "Refresh token is not the stored token");
                ServiceError::InvalidRefreshToken
            })?;

        if user.id != claims.sub || !user.is_active {
            tracing::warn!(user_id = %user.id, "Refresh token holder mismatch or inactive");
            return Err(ServiceError::InvalidRefreshToken);
        }

        let refresh_token = self.jwt.generate_refresh_token(user.id)?;
        if !self
            .directory
            .rotate_refresh_token(user.id, presented, &refresh_token)
            .await?
        {
            tracing::warn!(user_id = %user.id, "Refresh token already rotated");
            return Err(ServiceError::InvalidRefreshToken);
        }

        let access_token = self.issue_access_token(&user)?;

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(self.pair(access_token, refresh_token))
    }

    /// Idempotent.
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.directory.set_refresh_token(user_id, None).await?;
        tracing::info!(user_id = %user_id, "Refresh token revoked");
        Ok(())
    }

    fn pair(&self, access_token: String, refresh_token: String) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        }
    }
}
