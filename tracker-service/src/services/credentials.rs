use once_cell::sync::OnceCell;
use secrecy::{Secret, SecretString};

use crate::models::User;
use crate::services::{ServiceError, UserDirectory};
use crate::utils::{hash_password_blocking, verify_password_blocking};

/// Verified against when the email is unknown so both failure paths cost one
/// Argon2 verification.
static DUMMY_HASH: OnceCell<String> = OnceCell::new();

const DUMMY_PASSWORD: &str = "timing-equaliser-password";

/// Hashed on the blocking pool on first use; a failure is logged and
/// returned, never replaced by a cheaper value.
async fn dummy_hash() -> Result<&'static str, ServiceError> {
    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash);
    }

    let hash = hash_password_blocking(Secret::new(DUMMY_PASSWORD.to_string()))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build dummy password hash");
            ServiceError::Internal(e)
        })?;

    Ok(DUMMY_HASH.get_or_init(|| hash))
}

#[derive(Clone)]
pub struct CredentialValidator {
    directory: UserDirectory,
}

impl CredentialValidator {
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }

    /// Build the dummy hash ahead of the first login.
    pub async fn warm_up() -> Result<(), ServiceError> {
        dummy_hash().await.map(|_| ())
    }

    /// Unknown email, wrong password and inactive account are all
    /// `InvalidCredentials`.
    pub async fn validate(&self, email: &str, password: SecretString) -> Result<User, ServiceError> {
        let Some(record) = self.directory.find_record_by_email(email).await? else {
            let dummy = dummy_hash().await?;
            let _ = verify_password_blocking(password, dummy.to_string()).await;
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password_blocking(password, record.password_hash).await? {
            tracing::info!(user_id = %record.user.id, "Password verification failed");
            return Err(ServiceError::InvalidCredentials);
        }

        if !record.user.is_active {
            tracing::info!(user_id = %record.user.id, "Login attempt on inactive account");
            return Err(ServiceError::InvalidCredentials);
        }

        Ok(record.user)
    }
}
