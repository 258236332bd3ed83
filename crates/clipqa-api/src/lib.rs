//! Reviewer HTTP API.
//!
//! This crate provides:
//! - Review queue navigation with atomic claim-and-lock
//! - Verdict, skip and unlock endpoints guarded by reviewer locks
//! - Clip listing, review statistics and operator reset
//! - HS256 bearer token authentication
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use auth::AuthUser;
pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
