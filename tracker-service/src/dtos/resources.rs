use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AssetType, SurfaceType};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    #[schema(example = "Acme external perimeter")]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAttackSurfaceRequest {
    pub surface_type: SurfaceType,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub config: Option<serde_json::Value>,
}

/// A `project_id` different from the current one moves the surface.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateAttackSurfaceRequest {
    pub project_id: Option<Uuid>,
    pub surface_type: Option<SurfaceType>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAssetRequest {
    #[validate(length(min = 1, max = 500, message = "Name must be 1-500 characters"))]
    #[schema(example = "api.example.com")]
    pub name: String,
    pub asset_type: AssetType,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// An `attack_surface_id` different from the current one moves the asset.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateAssetRequest {
    pub attack_surface_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500, message = "Name must be 1-500 characters"))]
    pub name: Option<String>,
    pub asset_type: Option<AssetType>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}
