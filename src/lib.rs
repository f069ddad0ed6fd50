//! OAuth2 bearer-token gate for an API resource server.
//!
//! Verifies signed (JWT) and opaque access tokens, enforces scope and expiry
//! on protected routes, and serves RFC 9728 protected resource metadata.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
