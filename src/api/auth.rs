//! Authentication API endpoints.
//!
//! - POST `/login` - Exchange credentials for an access and a refresh token
//! - POST `/refresh` - Exchange an expired access token plus refresh token for a new access token
//! - GET `/verify` - Check a token against a route and the request's identity parameters

use axum::{
    Json, Router,
    extract::{Query, State},
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{AuthError, AuthService, IdentityParams, LoginResponse, RefreshResponse};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

pub fn router(service: AuthService, rate_limit: Arc<RateLimitConfig>) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(service.clone())
        .layer(middleware::from_fn_with_state(rate_limit, rate_limit_login));

    Router::new()
        .route("/refresh", post(refresh))
        .route("/verify", get(verify))
        .with_state(service)
        .merge(login_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(service): State<AuthService>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    service
        .login(&request.username, &request.password)
        .await
        .map(Json)
}

#[derive(Deserialize)]
struct RefreshRequest {
    access_token: String,
    refresh_token: String,
}

async fn refresh(
    State(service): State<AuthService>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    service
        .refresh(&request.access_token, &request.refresh_token)
        .await
        .map(Json)
}

#[derive(Deserialize)]
struct VerifyQuery {
    #[serde(default)]
    token: String,
    #[serde(rename = "routeName", default)]
    route_name: String,
    #[serde(flatten)]
    identity: IdentityParams,
}

#[derive(Serialize)]
struct VerifyResponse {
    is_authorized: bool,
}

async fn verify(
    State(service): State<AuthService>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, AuthError> {
    service.verify(&query.token, &query.route_name, &query.identity)?;
    Ok(Json(VerifyResponse {
        is_authorized: true,
    }))
}
