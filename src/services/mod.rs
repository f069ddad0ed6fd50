pub mod auth;
pub mod metadata;
