//! Storage seam. The PostgreSQL `Database` and the `InMemoryStore` both
//! implement these traits; services only ever hold `Arc<dyn ...>`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Asset, AttackSurface, ProfileUpdate, Project, Role, User, UserRecord};
use crate::services::ServiceError;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, ServiceError>;

    /// `email` is expected in normalised (lower-case) form.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError>;

    async fn find_user_by_refresh_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserRecord>, ServiceError>;

    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;

    /// Fails with `EmailAlreadyRegistered` when the email is taken.
    async fn insert_user(&self, record: &UserRecord) -> Result<(), ServiceError>;

    /// Fails with `EmailAlreadyRegistered` when the new email is taken.
    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, ServiceError>;

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, ServiceError>;

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Option<User>, ServiceError>;

    async fn update_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<User>, ServiceError>;

    /// Unconditional write of the stored refresh digest (issue / revoke).
    async fn set_refresh_token_hash(
        &self,
        user_id: Uuid,
        token_hash: Option<&str>,
    ) -> Result<bool, ServiceError>;

    /// Compare-and-swap of the stored refresh digest. Returns false when the
    /// stored value no longer equals `expected_hash`.
    async fn replace_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, ServiceError>;

    /// Removes the user and everything they own.
    async fn delete_user(&self, user_id: Uuid) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, ServiceError>;

    /// All projects when `owner_id` is `None`.
    async fn list_projects(&self, owner_id: Option<Uuid>) -> Result<Vec<Project>, ServiceError>;

    async fn insert_project(&self, project: &Project) -> Result<(), ServiceError>;

    async fn update_project(&self, project: &Project) -> Result<bool, ServiceError>;

    /// Cascades to the project's surfaces and their assets.
    async fn delete_project(&self, project_id: Uuid) -> Result<bool, ServiceError>;

    async fn find_attack_surface(
        &self,
        surface_id: Uuid,
    ) -> Result<Option<AttackSurface>, ServiceError>;

    async fn list_attack_surfaces(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<AttackSurface>, ServiceError>;

    async fn insert_attack_surface(&self, surface: &AttackSurface) -> Result<(), ServiceError>;

    /// Writes only while the stored row still belongs to
    /// `expected_project_id`; false when it is gone or was moved meanwhile.
    async fn update_attack_surface(
        &self,
        surface: &AttackSurface,
        expected_project_id: Uuid,
    ) -> Result<bool, ServiceError>;

    /// Cascades to the surface's assets.
    async fn delete_attack_surface(&self, surface_id: Uuid) -> Result<bool, ServiceError>;

    async fn find_asset(&self, asset_id: Uuid) -> Result<Option<Asset>, ServiceError>;

    async fn list_assets(&self, surface_id: Uuid) -> Result<Vec<Asset>, ServiceError>;

    async fn insert_asset(&self, asset: &Asset) -> Result<(), ServiceError>;

    /// Writes only while the stored row still belongs to
    /// `expected_surface_id`; false when it is gone or was moved meanwhile.
    async fn update_asset(
        &self,
        asset: &Asset,
        expected_surface_id: Uuid,
    ) -> Result<bool, ServiceError>;

    async fn delete_asset(&self, asset_id: Uuid) -> Result<bool, ServiceError>;
}
