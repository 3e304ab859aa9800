pub mod auth;

pub use auth::{authorization_gate_middleware, AdminUser, AuthUser};
