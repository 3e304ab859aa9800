//! Services layer for tracker-service.

mod auth;
mod credentials;
mod database;
mod directory;
pub mod error;
mod gate;
mod jwt;
mod keyed_lock;
mod memory;
mod ownership;
mod resources;
pub mod store;
mod token;

pub use auth::AuthService;
pub use credentials::CredentialValidator;
pub use database::Database;
pub use directory::{hash_refresh_token, NewUser, UserDirectory};
pub use error::ServiceError;
pub use gate::{AuthorizationGate, PublicRoute, PublicRoutes};
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims};
pub use memory::InMemoryStore;
pub use ownership::{can_act_on, OwnershipResolver};
pub use resources::ResourceService;
pub use store::{ResourceStore, UserStore};
pub use token::{TokenPair, TokenService};
