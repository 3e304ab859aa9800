//! Project, attack surface and asset CRUD. Every entry point goes through
//! the ownership resolver before touching the store.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::resources::{
    CreateAssetRequest, CreateAttackSurfaceRequest, CreateProjectRequest, UpdateAssetRequest,
    UpdateAttackSurfaceRequest, UpdateProjectRequest,
};
use crate::models::{Asset, AttackSurface, Project, User};
use crate::services::store::ResourceStore;
use crate::services::{OwnershipResolver, ServiceError};

/// Conditional writes retried after the row moved under a concurrent update.
const WRITE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
    ownership: OwnershipResolver,
}

impl ResourceService {
    pub fn new(store: Arc<dyn ResourceStore>, ownership: OwnershipResolver) -> Self {
        Self { store, ownership }
    }

    // ==================== Projects ====================

    /// Admins see every project; everyone else sees their own.
    pub async fn list_projects(&self, user: &User) -> Result<Vec<Project>, ServiceError> {
        let owner = if user.is_admin() { None } else { Some(user.id) };
        self.store.list_projects(owner).await
    }

    /// The owner is always the caller.
    pub async fn create_project(
        &self,
        user: &User,
        req: CreateProjectRequest,
    ) -> Result<Project, ServiceError> {
        let project = Project::new(user.id, req.name, req.description);
        self.store.insert_project(&project).await?;

        tracing::info!(project_id = %project.id, owner_id = %user.id, "Project created");
        Ok(project)
    }

    pub async fn get_project(&self, project_id: Uuid, user: &User) -> Result<Project, ServiceError> {
        self.ownership.authorize_project(project_id, user).await
    }

    pub async fn update_project(
        &self,
        project_id: Uuid,
        user: &User,
        req: UpdateProjectRequest,
    ) -> Result<Project, ServiceError> {
        let mut project = self.ownership.authorize_project(project_id, user).await?;

        if let Some(name) = req.name {
            project.name = name;
        }
        if let Some(description) = req.description {
            project.description = Some(description);
        }
        project.updated_at = Utc::now();

        if !self.store.update_project(&project).await? {
            return Err(ServiceError::NotFound("Project"));
        }
        Ok(project)
    }

    pub async fn delete_project(&self, project_id: Uuid, user: &User) -> Result<(), ServiceError> {
        self.ownership.authorize_project(project_id, user).await?;

        if !self.store.delete_project(project_id).await? {
            return Err(ServiceError::NotFound("Project"));
        }

        tracing::info!(project_id = %project_id, user_id = %user.id, "Project deleted");
        Ok(())
    }

    // ==================== Attack surfaces ====================

    pub async fn list_attack_surfaces(
        &self,
        project_id: Uuid,
        user: &User,
    ) -> Result<Vec<AttackSurface>, ServiceError> {
        self.ownership.authorize_project(project_id, user).await?;
        self.store.list_attack_surfaces(project_id).await
    }

    pub async fn create_attack_surface(
        &self,
        project_id: Uuid,
        user: &User,
        req: CreateAttackSurfaceRequest,
    ) -> Result<AttackSurface, ServiceError> {
        self.ownership.authorize_project(project_id, user).await?;

        let surface = AttackSurface::new(project_id, req.surface_type, req.description, req.config);
        self.store.insert_attack_surface(&surface).await?;

        tracing::info!(attack_surface_id = %surface.id, project_id = %project_id, "Attack surface created");
        Ok(surface)
    }

    pub async fn get_attack_surface(
        &self,
        surface_id: Uuid,
        user: &User,
    ) -> Result<AttackSurface, ServiceError> {
        self.ownership.authorize_attack_surface(surface_id, user).await
    }

    /// A `project_id` that differs from the current parent is a move. The
    /// write is conditional on the parent that was authorized; if the row
    /// moved in between, authorization runs again against where it is now.
    pub async fn update_attack_surface(
        &self,
        surface_id: Uuid,
        user: &User,
        req: UpdateAttackSurfaceRequest,
    ) -> Result<AttackSurface, ServiceError> {
        for _ in 0..WRITE_ATTEMPTS {
            let current = self.ownership.authorize_attack_surface(surface_id, user).await?;
            let authorized_parent = current.project_id;

            let mut surface = match req.project_id {
                Some(new_project_id) if new_project_id != authorized_parent => {
                    let (mut surface, destination) = self
                        .ownership
                        .authorize_surface_move(surface_id, new_project_id, user)
                        .await?;
                    if surface.project_id != authorized_parent {
                        continue;
                    }
                    surface.project_id = destination.id;
                    surface
                }
                _ => current,
            };

            if let Some(surface_type) = req.surface_type {
                surface.surface_type = surface_type;
            }
            if let Some(description) = &req.description {
                surface.description = Some(description.clone());
            }
            if let Some(config) = &req.config {
                surface.config = Some(config.clone());
            }
            surface.updated_at = Utc::now();

            if self
                .store
                .update_attack_surface(&surface, authorized_parent)
                .await?
            {
                if surface.project_id != authorized_parent {
                    tracing::info!(
                        attack_surface_id = %surface_id,
                        from = %authorized_parent,
                        to = %surface.project_id,
                        "Attack surface moved"
                    );
                }
                return Ok(surface);
            }

            tracing::warn!(
                attack_surface_id = %surface_id,
                "Attack surface changed during update, re-authorizing"
            );
        }

        Err(ServiceError::NotFound("Attack surface"))
    }

    pub async fn delete_attack_surface(
        &self,
        surface_id: Uuid,
        user: &User,
    ) -> Result<(), ServiceError> {
        self.ownership.authorize_attack_surface(surface_id, user).await?;

        if !self.store.delete_attack_surface(surface_id).await? {
            return Err(ServiceError::NotFound("Attack surface"));
        }

        tracing::info!(attack_surface_id = %surface_id, user_id = %user.id, "Attack surface deleted");
        Ok(())
    }

    // ==================== Assets ====================

    pub async fn list_assets(
        &self,
        surface_id: Uuid,
        user: &User,
    ) -> Result<Vec<Asset>, ServiceError> {
        self.ownership.authorize_attack_surface(surface_id, user).await?;
        self.store.list_assets(surface_id).await
    }

    pub async fn create_asset(
        &self,
        surface_id: Uuid,
        user: &User,
        req: CreateAssetRequest,
    ) -> Result<Asset, ServiceError> {
        self.ownership.authorize_attack_surface(surface_id, user).await?;

        let asset = Asset::new(
            surface_id,
            req.name,
            req.asset_type,
            req.description,
            req.metadata,
        );
        self.store.insert_asset(&asset).await?;

        tracing::info!(asset_id = %asset.id, attack_surface_id = %surface_id, "Asset created");
        Ok(asset)
    }

    pub async fn get_asset(&self, asset_id: Uuid, user: &User) -> Result<Asset, ServiceError> {
        self.ownership.authorize_asset(asset_id, user).await
    }

    /// As [`update_attack_surface`](Self::update_attack_surface), with the
    /// surface as the parent.
    pub async fn update_asset(
        &self,
        asset_id: Uuid,
        user: &User,
        req: UpdateAssetRequest,
    ) -> Result<Asset, ServiceError> {
        for _ in 0..WRITE_ATTEMPTS {
            let current = self.ownership.authorize_asset(asset_id, user).await?;
            let authorized_parent = current.attack_surface_id;

            let mut asset = match req.attack_surface_id {
                Some(new_surface_id) if new_surface_id != authorized_parent => {
                    let (mut asset, destination) = self
                        .ownership
                        .authorize_asset_move(asset_id, new_surface_id, user)
                        .await?;
                    if asset.attack_surface_id != authorized_parent {
                        continue;
                    }
                    asset.attack_surface_id = destination.id;
                    asset
                }
                _ => current,
            };

            if let Some(name) = &req.name {
                asset.name = name.clone();
            }
            if let Some(asset_type) = req.asset_type {
                asset.asset_type = asset_type;
            }
            if let Some(description) = &req.description {
                asset.description = Some(description.clone());
            }
            if let Some(metadata) = &req.metadata {
                asset.metadata = Some(metadata.clone());
            }
            asset.updated_at = Utc::now();

            if self.store.update_asset(&asset, authorized_parent).await? {
                if asset.attack_surface_id != authorized_parent {
                    tracing::info!(
                        asset_id = %asset_id,
                        from = %authorized_parent,
                        to = %asset.attack_surface_id,
                        "Asset moved"
                    );
                }
                return Ok(asset);
            }

            tracing::warn!(asset_id = %asset_id, "Asset changed during update, re-authorizing");
        }

        Err(ServiceError::NotFound("Asset"))
    }

    pub async fn delete_asset(&self, asset_id: Uuid, user: &User) -> Result<(), ServiceError> {
        self.ownership.authorize_asset(asset_id, user).await?;

        if !self.store.delete_asset(asset_id).await? {
            return Err(ServiceError::NotFound("Asset"));
        }

        tracing::info!(asset_id = %asset_id, user_id = %user.id, "Asset deleted");
        Ok(())
    }
}
