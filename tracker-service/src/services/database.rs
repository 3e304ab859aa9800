//! PostgreSQL storage for tracker-service.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::models::{
    Asset, AssetType, AttackSurface, ProfileUpdate, Project, Role, SurfaceType, User, UserRecord,
};
use crate::services::store::{ResourceStore, UserStore};
use crate::services::ServiceError;

const USER_COLUMNS: &str = "user_id, email, display_name, password_hash, role_code, is_active, \
                            refresh_token_hash, created_utc, updated_utc";

const PROJECT_COLUMNS: &str = "project_id AS id, name, description, owner_id, \
                               created_utc AS created_at, updated_utc AS updated_at";

const SURFACE_COLUMNS: &str = "attack_surface_id, project_id, surface_type_code, description, \
                               config, created_utc, updated_utc";

const ASSET_COLUMNS: &str = "asset_id, attack_surface_id, name, asset_type_code, description, \
                             metadata, created_utc, updated_utc";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_err(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

fn user_record_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    let role_code: String = row.try_get("role_code")?;
    let role = role_code
        .parse::<Role>()
        .map_err(|e| decode_err("role_code", e))?;

    Ok(UserRecord {
        user: User {
            id: row.try_get("user_id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_utc")?,
            updated_at: row.try_get("updated_utc")?,
        },
        password_hash: row.try_get("password_hash")?,
        refresh_token_hash: row.try_get("refresh_token_hash")?,
    })
}

fn surface_from_row(row: &PgRow) -> Result<AttackSurface, sqlx::Error> {
    let code: String = row.try_get("surface_type_code")?;
    Ok(AttackSurface {
        id: row.try_get("attack_surface_id")?,
        project_id: row.try_get("project_id")?,
        surface_type: code
            .parse::<SurfaceType>()
            .map_err(|e| decode_err("surface_type_code", e))?,
        description: row.try_get("description")?,
        config: row.try_get("config")?,
        created_at: row.try_get("created_utc")?,
        updated_at: row.try_get("updated_utc")?,
    })
}

fn asset_from_row(row: &PgRow) -> Result<Asset, sqlx::Error> {
    let code: String = row.try_get("asset_type_code")?;
    Ok(Asset {
        id: row.try_get("asset_id")?,
        attack_surface_id: row.try_get("attack_surface_id")?,
        name: row.try_get("name")?,
        asset_type: code
            .parse::<AssetType>()
            .map_err(|e| decode_err("asset_type_code", e))?,
        description: row.try_get("description")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_utc")?,
        updated_at: row.try_get("updated_utc")?,
    })
}

/// Unique-index violations on `users.email` surface as a conflict.
fn map_email_conflict(err: sqlx::Error) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::EmailAlreadyRegistered
        }
        _ => ServiceError::Database(err),
    }
}

#[async_trait]
impl UserStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, ServiceError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_record_from_row).transpose()?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_record_from_row).transpose()?)
    }

    async fn find_user_by_refresh_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserRecord>, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE refresh_token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_record_from_row).transpose()?)
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_utc"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| user_record_from_row(row).map(|r| r.user))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServiceError::from)
    }

    async fn insert_user(&self, record: &UserRecord) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, password_hash, role_code, is_active,
                               refresh_token_hash, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.user.id)
        .bind(&record.user.email)
        .bind(&record.user.display_name)
        .bind(&record.password_hash)
        .bind(record.user.role.as_str())
        .bind(record.user.is_active)
        .bind(&record.refresh_token_hash)
        .bind(record.user.created_at)
        .bind(record.user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_email_conflict)?;
        Ok(())
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, ServiceError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                display_name = COALESCE($3, display_name),
                updated_utc = NOW()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&update.email)
        .bind(&update.display_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_email_conflict)?;
        Ok(row
            .as_ref()
            .map(user_record_from_row)
            .transpose()?
            .map(|r| r.user))
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_utc = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Option<User>, ServiceError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role_code = $2, updated_utc = NOW() WHERE user_id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .as_ref()
            .map(user_record_from_row)
            .transpose()?
            .map(|r| r.user))
    }

    async fn update_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<User>, ServiceError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_active = $2, updated_utc = NOW() WHERE user_id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .as_ref()
            .map(user_record_from_row)
            .transpose()?
            .map(|r| r.user))
    }

    async fn set_refresh_token_hash(
        &self,
        user_id: Uuid,
        token_hash: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3 \
             WHERE user_id = $1 AND refresh_token_hash = $2",
        )
        .bind(user_id)
        .bind(expected_hash)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        // Owned projects, surfaces and assets go with the FK cascade.
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ResourceStore for Database {
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, ServiceError> {
        Ok(sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = $1"
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_projects(&self, owner_id: Option<Uuid>) -> Result<Vec<Project>, ServiceError> {
        Ok(sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects \
             WHERE ($1::uuid IS NULL OR owner_id = $1) ORDER BY created_utc"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_project(&self, project: &Project) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO projects (project_id, owner_id, name, description, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(project.id)
        .bind(project.owner_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_project(&self, project: &Project) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "UPDATE projects SET name = $2, description = $3, updated_utc = $4 \
             WHERE project_id = $1",
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_project(&self, project_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM projects WHERE project_id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_attack_surface(
        &self,
        surface_id: Uuid,
    ) -> Result<Option<AttackSurface>, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT {SURFACE_COLUMNS} FROM attack_surfaces WHERE attack_surface_id = $1"
        ))
        .bind(surface_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(surface_from_row).transpose()?)
    }

    async fn list_attack_surfaces(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<AttackSurface>, ServiceError> {
        let rows = sqlx::query(&format!(
            "SELECT {SURFACE_COLUMNS} FROM attack_surfaces WHERE project_id = $1 \
             ORDER BY created_utc"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(surface_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServiceError::from)
    }

    async fn insert_attack_surface(&self, surface: &AttackSurface) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO attack_surfaces (attack_surface_id, project_id, surface_type_code,
                                         description, config, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(surface.id)
        .bind(surface.project_id)
        .bind(surface.surface_type.as_str())
        .bind(&surface.description)
        .bind(&surface.config)
        .bind(surface.created_at)
        .bind(surface.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_attack_surface(
        &self,
        surface: &AttackSurface,
        expected_project_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE attack_surfaces
            SET project_id = $2, surface_type_code = $3, description = $4, config = $5,
                updated_utc = $6
            WHERE attack_surface_id = $1 AND project_id = $7
            "#,
        )
        .bind(surface.id)
        .bind(surface.project_id)
        .bind(surface.surface_type.as_str())
        .bind(&surface.description)
        .bind(&surface.config)
        .bind(surface.updated_at)
        .bind(expected_project_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_attack_surface(&self, surface_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM attack_surfaces WHERE attack_surface_id = $1")
            .bind(surface_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_asset(&self, asset_id: Uuid) -> Result<Option<Asset>, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE asset_id = $1"
        ))
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(asset_from_row).transpose()?)
    }

    async fn list_assets(&self, surface_id: Uuid) -> Result<Vec<Asset>, ServiceError> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE attack_surface_id = $1 ORDER BY created_utc"
        ))
        .bind(surface_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(asset_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServiceError::from)
    }

    async fn insert_asset(&self, asset: &Asset) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO assets (asset_id, attack_surface_id, name, asset_type_code, description,
                                metadata, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(asset.id)
        .bind(asset.attack_surface_id)
        .bind(&asset.name)
        .bind(asset.asset_type.as_str())
        .bind(&asset.description)
        .bind(&asset.metadata)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_asset(
        &self,
        asset: &Asset,
        expected_surface_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET attack_surface_id = $2, name = $3, asset_type_code = $4, description = $5,
                metadata = $6, updated_utc = $7
            WHERE asset_id = $1 AND attack_surface_id = $8
            "#,
        )
        .bind(asset.id)
        .bind(asset.attack_surface_id)
        .bind(&asset.name)
        .bind(asset.asset_type.as_str())
        .bind(&asset.description)
        .bind(&asset.metadata)
        .bind(asset.updated_at)
        .bind(expected_surface_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_asset(&self, asset_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM assets WHERE asset_id = $1")
            .bind(asset_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
