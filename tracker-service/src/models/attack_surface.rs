//! Attack surface model - belongs to exactly one project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    WebApplication,
    Api,
    MobileApplication,
    Network,
    Cloud,
    Other,
}

impl SurfaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceType::WebApplication => "web_application",
            SurfaceType::Api => "api",
            SurfaceType::MobileApplication => "mobile_application",
            SurfaceType::Network => "network",
            SurfaceType::Cloud => "cloud",
            SurfaceType::Other => "other",
        }
    }
}

impl std::str::FromStr for SurfaceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_application" => Ok(SurfaceType::WebApplication),
            "api" => Ok(SurfaceType::Api),
            "mobile_application" => Ok(SurfaceType::MobileApplication),
            "network" => Ok(SurfaceType::Network),
            "cloud" => Ok(SurfaceType::Cloud),
            "other" => Ok(SurfaceType::Other),
            _ => Err(format!("Invalid surface type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttackSurface {
    pub id: Uuid,
    pub project_id: Uuid,
    pub surface_type: SurfaceType,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttackSurface {
    pub fn new(
        project_id: Uuid,
        surface_type: SurfaceType,
        description: Option<String>,
        config: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            surface_type,
            description,
            config,
            created_at: now,
            updated_at: now,
        }
    }
}
