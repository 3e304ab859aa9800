//! Ownership checks for the Project -> AttackSurface -> Asset hierarchy.
//!
//! Surfaces and assets have no owner of their own; every check walks up to
//! the project and applies [`can_act_on`].

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Asset, AttackSurface, Project, User};
use crate::services::store::ResourceStore;
use crate::services::ServiceError;

/// The ownership predicate. Admins pass; everyone else must own the project.
pub fn can_act_on(user: &User, project: &Project) -> bool {
    user.is_admin() || project.owner_id == user.id
}

#[derive(Clone)]
pub struct OwnershipResolver {
    store: Arc<dyn ResourceStore>,
    allow_owner_reparent: bool,
}

impl OwnershipResolver {
    pub fn new(store: Arc<dyn ResourceStore>, allow_owner_reparent: bool) -> Self {
        Self {
            store,
            allow_owner_reparent,
        }
    }

    pub async fn authorize_project(
        &self,
        project_id: Uuid,
        user: &User,
    ) -> Result<Project, ServiceError> {
        let project = self
            .store
            .find_project(project_id)
            .await?
            .ok_or(ServiceError::NotFound("Project"))?;

        if !can_act_on(user, &project) {
            tracing::warn!(
                user_id = %user.id,
                project_id = %project_id,
                "Ownership check failed"
            );
            return Err(ServiceError::Forbidden);
        }

        Ok(project)
    }

    pub async fn authorize_attack_surface(
        &self,
        surface_id: Uuid,
        user: &User,
    ) -> Result<AttackSurface, ServiceError> {
        let surface = self
            .store
            .find_attack_surface(surface_id)
            .await?
            .ok_or(ServiceError::NotFound("Attack surface"))?;

        self.authorize_project(surface.project_id, user).await?;
        Ok(surface)
    }

    pub async fn authorize_asset(&self, asset_id: Uuid, user: &User) -> Result<Asset, ServiceError> {
        let asset = self
            .store
            .find_asset(asset_id)
            .await?
            .ok_or(ServiceError::NotFound("Asset"))?;

        self.authorize_attack_surface(asset.attack_surface_id, user)
            .await?;
        Ok(asset)
    }

    /// Both the current and the destination project must pass, and moving
    /// requires admin unless owner re-parenting is enabled.
    pub async fn authorize_surface_move(
        &self,
        surface_id: Uuid,
        new_project_id: Uuid,
        user: &User,
    ) -> Result<(AttackSurface, Project), ServiceError> {
        let surface = self.authorize_attack_surface(surface_id, user).await?;
        self.require_reparent_permission(user)?;
        let destination = self.authorize_project(new_project_id, user).await?;
        Ok((surface, destination))
    }

    pub async fn authorize_asset_move(
        &self,
        asset_id: Uuid,
        new_surface_id: Uuid,
        user: &User,
    ) -> Result<(Asset, AttackSurface), ServiceError> {
        let asset = self.authorize_asset(asset_id, user).await?;
        self.require_reparent_permission(user)?;
        let destination = self.authorize_attack_surface(new_surface_id, user).await?;
        Ok((asset, destination))
    }

    fn require_reparent_permission(&self, user: &User) -> Result<(), ServiceError> {
        if user.is_admin() || self.allow_owner_reparent {
            Ok(())
        } else {
            tracing::warn!(user_id = %user.id, "Re-parenting requires admin");
            Err(ServiceError::Forbidden)
        }
    }
}
