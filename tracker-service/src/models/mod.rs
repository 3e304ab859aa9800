pub mod asset;
pub mod attack_surface;
pub mod project;
pub mod user;

pub use asset::{Asset, AssetType};
pub use attack_surface::{AttackSurface, SurfaceType};
pub use project::Project;
pub use user::{normalize_email, ProfileUpdate, Role, User, UserRecord};
