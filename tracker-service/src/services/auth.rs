use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::auth::{AuthResponse, LoginRequest, RegisterRequest},
    models::Role,
    services::{CredentialValidator, NewUser, ServiceError, TokenPair, TokenService, UserDirectory},
};

/// Registration, login, refresh and logout flows.
#[derive(Clone)]
pub struct AuthService {
    directory: UserDirectory,
    credentials: CredentialValidator,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(
        directory: UserDirectory,
        credentials: CredentialValidator,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            directory,
            credentials,
            tokens,
        }
    }

    /// Self-registration always creates a plain user.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let user = self
            .directory
            .create(NewUser {
                email: req.email,
                password: Secret::new(req.password),
                display_name: req.display_name,
                role: Role::User,
            })
            .await?;

        let tokens = self.tokens.issue_pair(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(AuthResponse { user, tokens })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<TokenPair, ServiceError> {
        let user = self
            .credentials
            .validate(&req.email, Secret::new(req.password))
            .await?;

        let tokens = self.tokens.issue_pair(&user).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(tokens)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        self.tokens.refresh(refresh_token).await
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.tokens.revoke(user_id).await
    }
}
