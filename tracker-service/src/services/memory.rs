use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::{Asset, AttackSurface, ProfileUpdate, Project, Role, User, UserRecord};
use crate::services::store::{ResourceStore, UserStore};
use crate::services::ServiceError;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, UserRecord>,
    projects: HashMap<Uuid, Project>,
    surfaces: HashMap<Uuid, AttackSurface>,
    assets: HashMap<Uuid, Asset>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|r| r.user.email == email && Some(r.user.id) != except)
    }

    fn remove_surface_cascade(&mut self, surface_id: Uuid) -> bool {
        self.assets.retain(|_, a| a.attack_surface_id != surface_id);
        self.surfaces.remove(&surface_id).is_some()
    }

    fn remove_project_cascade(&mut self, project_id: Uuid) -> bool {
        let surface_ids: Vec<Uuid> = self
            .surfaces
            .values()
            .filter(|s| s.project_id == project_id)
            .map(|s| s.id)
            .collect();
        for surface_id in surface_ids {
            self.remove_surface_cascade(surface_id);
        }
        self.projects.remove(&project_id).is_some()
    }
}

/// Process-local store for tests and `STORAGE_BACKEND=memory` runs.
///
/// Every operation takes the single lock once, so the refresh-token
/// compare-and-swap is atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, ServiceError> {
        self.state
            .read()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, ServiceError> {
        self.state
            .write()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.read().map(|_| ())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|r| r.user.email == email)
            .cloned())
    }

    async fn find_user_by_refresh_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|r| r.refresh_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let mut users: Vec<User> = self
            .read()?
            .users
            .values()
            .map(|r| r.user.clone())
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn insert_user(&self, record: &UserRecord) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state.email_taken(&record.user.email, None) {
            return Err(ServiceError::EmailAlreadyRegistered);
        }
        state.users.insert(record.user.id, record.clone());
        Ok(())
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, ServiceError> {
        let mut state = self.write()?;
        if let Some(email) = &update.email {
            if state.email_taken(email, Some(user_id)) {
                return Err(ServiceError::EmailAlreadyRegistered);
            }
        }
        let Some(record) = state.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(email) = &update.email {
            record.user.email = email.clone();
        }
        if let Some(display_name) = &update.display_name {
            record.user.display_name = Some(display_name.clone());
        }
        record.user.updated_at = Utc::now();
        Ok(Some(record.user.clone()))
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        Ok(match state.users.get_mut(&user_id) {
            Some(record) => {
                record.password_hash = password_hash.to_string();
                record.user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Option<User>, ServiceError> {
        let mut state = self.write()?;
        Ok(state.users.get_mut(&user_id).map(|record| {
            record.user.role = role;
            record.user.updated_at = Utc::now();
            record.user.clone()
        }))
    }

    async fn update_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<User>, ServiceError> {
        let mut state = self.write()?;
        Ok(state.users.get_mut(&user_id).map(|record| {
            record.user.is_active = is_active;
            record.user.updated_at = Utc::now();
            record.user.clone()
        }))
    }

    async fn set_refresh_token_hash(
        &self,
        user_id: Uuid,
        token_hash: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        Ok(match state.users.get_mut(&user_id) {
            Some(record) => {
                record.refresh_token_hash = token_hash.map(str::to_string);
                true
            }
            None => false,
        })
    }

    async fn replace_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        Ok(match state.users.get_mut(&user_id) {
            Some(record) if record.refresh_token_hash.as_deref() == Some(expected_hash) => {
                record.refresh_token_hash = Some(new_hash.to_string());
                true
            }
            _ => false,
        })
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        let owned: Vec<Uuid> = state
            .projects
            .values()
            .filter(|p| p.owner_id == user_id)
            .map(|p| p.id)
            .collect();
        for project_id in owned {
            state.remove_project_cascade(project_id);
        }
        Ok(state.users.remove(&user_id).is_some())
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, ServiceError> {
        Ok(self.read()?.projects.get(&project_id).cloned())
    }

    async fn list_projects(&self, owner_id: Option<Uuid>) -> Result<Vec<Project>, ServiceError> {
        let mut projects: Vec<Project> = self
            .read()?
            .projects
            .values()
            .filter(|p| owner_id.map_or(true, |owner| p.owner_id == owner))
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn insert_project(&self, project: &Project) -> Result<(), ServiceError> {
        self.write()?.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn update_project(&self, project: &Project) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        Ok(match state.projects.get_mut(&project.id) {
            Some(existing) => {
                *existing = project.clone();
                true
            }
            None => false,
        })
    }

    async fn delete_project(&self, project_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.write()?.remove_project_cascade(project_id))
    }

    async fn find_attack_surface(
        &self,
        surface_id: Uuid,
    ) -> Result<Option<AttackSurface>, ServiceError> {
        Ok(self.read()?.surfaces.get(&surface_id).cloned())
    }

    async fn list_attack_surfaces(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<AttackSurface>, ServiceError> {
        let mut surfaces: Vec<AttackSurface> = self
            .read()?
            .surfaces
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        surfaces.sort_by_key(|s| s.created_at);
        Ok(surfaces)
    }

    async fn insert_attack_surface(&self, surface: &AttackSurface) -> Result<(), ServiceError> {
        self.write()?.surfaces.insert(surface.id, surface.clone());
        Ok(())
    }

    async fn update_attack_surface(
        &self,
        surface: &AttackSurface,
        expected_project_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        Ok(match state.surfaces.get_mut(&surface.id) {
            Some(existing) if existing.project_id == expected_project_id => {
                *existing = surface.clone();
                true
            }
            _ => false,
        })
    }

    async fn delete_attack_surface(&self, surface_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.write()?.remove_surface_cascade(surface_id))
    }

    async fn find_asset(&self, asset_id: Uuid) -> Result<Option<Asset>, ServiceError> {
        Ok(self.read()?.assets.get(&asset_id).cloned())
    }

    async fn list_assets(&self, surface_id: Uuid) -> Result<Vec<Asset>, ServiceError> {
        let mut assets: Vec<Asset> = self
            .read()?
            .assets
            .values()
            .filter(|a| a.attack_surface_id == surface_id)
            .cloned()
            .collect();
        assets.sort_by_key(|a| a.created_at);
        Ok(assets)
    }

    async fn insert_asset(&self, asset: &Asset) -> Result<(), ServiceError> {
        self.write()?.assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn update_asset(
        &self,
        asset: &Asset,
        expected_surface_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut state = self.write()?;
        Ok(match state.assets.get_mut(&asset.id) {
            Some(existing) if existing.attack_surface_id == expected_surface_id => {
                *existing = asset.clone();
                true
            }
            _ => false,
        })
    }

    async fn delete_asset(&self, asset_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.write()?.assets.remove(&asset_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetType, SurfaceType};

    fn record(email: &str) -> UserRecord {
        UserRecord::new(email.to_string(), None, Role::User, "hash".to_string())
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_user(&record("a@example.com")).await.unwrap();

        let err = store.insert_user(&record("a@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyRegistered));
    }

    #[tokio::test]
    async fn test_replace_refresh_hash_only_when_expected_matches() {
        let store = InMemoryStore::new();
        let user = record("a@example.com");
        store.insert_user(&user).await.unwrap();
        store
            .set_refresh_token_hash(user.user.id, Some("h1"))
            .await
            .unwrap();

        assert!(store
            .replace_refresh_token_hash(user.user.id, "h1", "h2")
            .await
            .unwrap());
        assert!(!store
            .replace_refresh_token_hash(user.user.id, "h1", "h3")
            .await
            .unwrap());

        let stored = store.find_user_by_id(user.user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let project = Project::new(owner, "P1".to_string(), None);
        let surface = AttackSurface::new(project.id, SurfaceType::Api, None, None);
        let asset = Asset::new(
            surface.id,
            "api.example.com".to_string(),
            AssetType::Domain,
            None,
            None,
        );
        store.insert_project(&project).await.unwrap();
        store.insert_attack_surface(&surface).await.unwrap();
        store.insert_asset(&asset).await.unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.find_attack_surface(surface.id).await.unwrap().is_none());
        assert!(store.find_asset(asset.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_asset_update_requires_expected_parent() {
        let store = InMemoryStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut asset = Asset::new(first, "host-1".to_string(), AssetType::Host, None, None);
        store.insert_asset(&asset).await.unwrap();

        asset.name = "host-2".to_string();
        assert!(!store.update_asset(&asset, second).await.unwrap());
        assert_eq!(store.find_asset(asset.id).await.unwrap().unwrap().name, "host-1");

        asset.attack_surface_id = second;
        assert!(store.update_asset(&asset, first).await.unwrap());
        let stored = store.find_asset(asset.id).await.unwrap().unwrap();
        assert_eq!(stored.attack_surface_id, second);
        assert_eq!(stored.name, "host-2");
    }
}
