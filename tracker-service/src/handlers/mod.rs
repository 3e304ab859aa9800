//! HTTP handlers for tracker-service.

pub mod admin;
pub mod assets;
pub mod auth;
pub mod projects;
pub mod surfaces;
pub mod users;
