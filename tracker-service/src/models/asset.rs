//! Asset model - belongs to exactly one attack surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Domain,
    Subdomain,
    IpAddress,
    Url,
    Endpoint,
    Repository,
    Host,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Domain => "domain",
            AssetType::Subdomain => "subdomain",
            AssetType::IpAddress => "ip_address",
            AssetType::Url => "url",
            AssetType::Endpoint => "endpoint",
            AssetType::Repository => "repository",
            AssetType::Host => "host",
            AssetType::Other => "other",
        }
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(AssetType::Domain),
            "subdomain" => Ok(AssetType::Subdomain),
            "ip_address" => Ok(AssetType::IpAddress),
            "url" => Ok(AssetType::Url),
            "endpoint" => Ok(AssetType::Endpoint),
            "repository" => Ok(AssetType::Repository),
            "host" => Ok(AssetType::Host),
            "other" => Ok(AssetType::Other),
            _ => Err(format!("Invalid asset type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Asset {
    pub id: Uuid,
    pub attack_surface_id: Uuid,
    pub name: String,
    pub asset_type: AssetType,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(
        attack_surface_id: Uuid,
        name: String,
        asset_type: AssetType,
        description: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            attack_surface_id,
            name,
            asset_type,
            description,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}
