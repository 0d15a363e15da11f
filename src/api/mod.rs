mod auth;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::rate_limit::RateLimitConfig;

/// Create the API router.
pub fn create_api_router(service: AuthService, rate_limit: Arc<RateLimitConfig>) -> Router {
    Router::new().nest("/auth", auth::router(service, rate_limit))
}
