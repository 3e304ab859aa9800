//! User directory: the only component that reads or writes user records.

use secrecy::SecretString;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use crate::models::{normalize_email, ProfileUpdate, Role, User, UserRecord};
use crate::services::store::UserStore;
use crate::services::ServiceError;
use crate::utils::{hash_password_blocking, verify_password_blocking};

/// Fields the generic profile update refuses to touch.
const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "password",
    "password_hash",
    "role",
    "is_active",
    "refresh_token",
];

/// Input for [`UserDirectory::create`]. Takes the plaintext password; no
/// API accepts a precomputed hash.
pub struct NewUser {
    pub email: String,
    pub password: SecretString,
    pub display_name: Option<String>,
    pub role: Role,
}

/// SHA-256 hex digest of a refresh token, as persisted on the user row.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.store.find_user_by_id(user_id).await?.map(|r| r.user))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.find_record_by_email(email).await?.map(|r| r.user))
    }

    /// Record including the password hash; for the credential validator.
    pub(crate) async fn find_record_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, ServiceError> {
        self.store.find_user_by_email(&normalize_email(email)).await
    }

    /// The user currently holding `token` as their refresh token, if any.
    pub async fn find_by_stored_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .store
            .find_user_by_refresh_token_hash(&hash_refresh_token(token))
            .await?
            .map(|r| r.user))
    }

    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        self.store.list_users().await
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, ServiceError> {
        let email = normalize_email(&new_user.email);
        if !email.validate_email() {
            return Err(ServiceError::Validation("Invalid email format".to_string()));
        }

        let password_hash = hash_password_blocking(new_user.password).await?;
        let record = UserRecord::new(email, new_user.display_name, new_user.role, password_hash);

        self.store.insert_user(&record).await?;

        tracing::info!(user_id = %record.user.id, role = record.user.role.as_str(), "User created");

        Ok(record.user)
    }

    /// Overwrite (or clear) the stored refresh token. Returns false for an
    /// unknown user.
    pub async fn set_refresh_token(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let digest = token.map(hash_refresh_token);
        self.store
            .set_refresh_token_hash(user_id, digest.as_deref())
            .await
    }

    /// Replace `expected` with `new` only if `expected` is still the stored
    /// token.
    pub async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, ServiceError> {
        self.store
            .replace_refresh_token_hash(
                user_id,
                &hash_refresh_token(expected),
                &hash_refresh_token(new),
            )
            .await
    }

    /// Generic profile update from a raw JSON object. Only `email` and
    /// `display_name` are accepted.
    pub async fn update(&self, user_id: Uuid, fields: Value) -> Result<User, ServiceError> {
        let Value::Object(map) = &fields else {
            return Err(ServiceError::Validation(
                "Profile update must be a JSON object".to_string(),
            ));
        };

        if let Some(field) = PROTECTED_FIELDS.iter().find(|f| map.contains_key(**f)) {
            return Err(ServiceError::Validation(format!(
                "Field '{}' cannot be changed through a profile update",
                field
            )));
        }

        let mut update: ProfileUpdate = serde_json::from_value(fields)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        if update.is_empty() {
            return Err(ServiceError::Validation(
                "No updatable fields supplied".to_string(),
            ));
        }

        update
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        if let Some(email) = update.email.take() {
            let email = normalize_email(&email);
            if !email.validate_email() {
                return Err(ServiceError::Validation("Invalid email format".to_string()));
            }
            update.email = Some(email);
        }

        let user = self
            .store
            .update_user_profile(user_id, &update)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        tracing::info!(user_id = %user.id, "User profile updated");
        Ok(user)
    }

    /// Requires the current password. Revokes the refresh token on success.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: SecretString,
        new: SecretString,
    ) -> Result<(), ServiceError> {
        let record = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if !verify_password_blocking(current, record.password_hash).await? {
            return Err(ServiceError::InvalidCredentials);
        }

        let password_hash = hash_password_blocking(new).await?;
        self.store.update_password_hash(user_id, &password_hash).await?;
        self.store.set_refresh_token_hash(user_id, None).await?;

        tracing::info!(user_id = %user_id, "Password changed, refresh token revoked");
        Ok(())
    }

    pub async fn set_role(&self, user_id: Uuid, role: Role) -> Result<User, ServiceError> {
        let user = self
            .store
            .update_role(user_id, role)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        tracing::info!(user_id = %user_id, role = role.as_str(), "User role changed");
        Ok(user)
    }

    /// Deactivation also revokes the refresh token.
    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> Result<User, ServiceError> {
        let user = self
            .store
            .update_active(user_id, is_active)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if !is_active {
            self.store.set_refresh_token_hash(user_id, None).await?;
        }

        tracing::info!(user_id = %user_id, is_active, "User status changed");
        Ok(user)
    }

    /// Deletes the user together with every project they own.
    pub async fn delete(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_user(user_id).await? {
            return Err(ServiceError::NotFound("User"));
        }

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryStore;
    use secrecy::Secret;
    use serde_json::json;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(InMemoryStore::new()))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: Secret::new("correct-horse".to_string()),
            display_name: None,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_normalises_email_and_enforces_uniqueness() {
        let directory = directory();
        let user = directory.create(new_user("Alice@Example.com")).await.unwrap();
        assert_eq!(user.email, "alice@example.com");

        let err = directory.create(new_user("ALICE@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyRegistered));

        let found = directory.find_by_email("alice@EXAMPLE.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_update_rejects_protected_fields() {
        let directory = directory();
        let user = directory.create(new_user("a@example.com")).await.unwrap();

        for field in ["role", "password_hash", "is_active", "refresh_token", "password", "id"] {
            let err = directory
                .update(user.id, json!({ field: "x" }))
                .await
                .unwrap_err();
            match err {
                ServiceError::Validation(message) => assert!(message.contains(field)),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let unchanged = directory.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.role, Role::User);
    }

    #[tokio::test]
    async fn test_update_enforces_display_name_length() {
        let directory = directory();
        let user = directory.create(new_user("a@example.com")).await.unwrap();

        let err = directory
            .update(user.id, json!({ "display_name": "x".repeat(101) }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let updated = directory
            .update(user.id, json!({ "display_name": "x".repeat(100) }))
            .await
            .unwrap();
        assert_eq!(updated.display_name.map(|n| n.len()), Some(100));
    }

    #[tokio::test]
    async fn test_update_changes_profile_fields() {
        let directory = directory();
        let user = directory.create(new_user("a@example.com")).await.unwrap();

        let updated = directory
            .update(user.id, json!({ "email": "New@Example.com", "display_name": "Alice" }))
            .await
            .unwrap();

        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_refresh_token_is_stored_as_digest() {
        let store = Arc::new(InMemoryStore::new());
        let directory = UserDirectory::new(store.clone());
        let user = directory.create(new_user("a@example.com")).await.unwrap();

        directory.set_refresh_token(user.id, Some("tok-1")).await.unwrap();

        let record = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(record.refresh_token_hash, Some(hash_refresh_token("tok-1")));
        assert_eq!(
            directory
                .find_by_stored_refresh_token("tok-1")
                .await
                .unwrap()
                .map(|u| u.id),
            Some(user.id)
        );

        assert!(directory
            .rotate_refresh_token(user.id, "tok-1", "tok-2")
            .await
            .unwrap());
        assert!(!directory
            .rotate_refresh_token(user.id, "tok-1", "tok-3")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_deactivation_revokes_refresh_token() {
        let directory = directory();
        let user = directory.create(new_user("a@example.com")).await.unwrap();
        directory.set_refresh_token(user.id, Some("tok")).await.unwrap();

        let user = directory.set_active(user.id, false).await.unwrap();

        assert!(!user.is_active);
        assert!(directory
            .find_by_stored_refresh_token("tok")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let directory = directory();
        let user = directory.create(new_user("a@example.com")).await.unwrap();

        let err = directory
            .change_password(
                user.id,
                Secret::new("wrong".to_string()),
                Secret::new("new-password".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        directory
            .change_password(
                user.id,
                Secret::new("correct-horse".to_string()),
                Secret::new("new-password".to_string()),
            )
            .await
            .unwrap();
    }
}
