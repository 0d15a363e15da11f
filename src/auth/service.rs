//! Login, verify and refresh.
//!
//! Access tokens are short-lived and stateless. Refresh tokens are long-lived
//! and registered with the repository; they can only be exchanged for a new
//! access token once the current access token has expired.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::claims::IdentityParams;
use super::errors::AuthError;
use super::permissions::RolePermissions;
use super::repository::AuthRepository;
use crate::jwt::{AccessTokenStatus, JwtConfig, JwtError};

/// Tokens issued on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token issued on refresh. The refresh token itself is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AuthRepository>,
    permissions: Arc<RolePermissions>,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn AuthRepository>,
        permissions: Arc<RolePermissions>,
        jwt: Arc<JwtConfig>,
    ) -> Self {
        Self {
            repo,
            permissions,
            jwt,
        }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Authenticate credentials and issue an access token plus a stored refresh token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let login = self
            .repo
            .find_by(username, password)
            .await
            .inspect_err(|e| warn!(username = %username, error = %e, "Login failed"))?;

        let claims = self.jwt.claims_for_login(&login).map_err(signing_error)?;
        let access_token = self
            .jwt
            .generate_access_token(&claims)
            .map_err(signing_error)?;

        let refresh = self
            .jwt
            .generate_refresh_token(&claims)
            .map_err(signing_error)?;
        self.repo.save_refresh_token(&refresh).await?;

        info!(username = %login.username, role = %login.role, "Login succeeded");

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh.token,
        })
    }

    /// Check that `token` is valid and allows calling `route_name` with `params`.
    pub fn verify(
        &self,
        token: &str,
        route_name: &str,
        params: &IdentityParams,
    ) -> Result<(), AuthError> {
        let claims = match self.jwt.decode_access_token(token) {
            AccessTokenStatus::Valid(claims) => claims,
            AccessTokenStatus::Expired | AccessTokenStatus::Invalid => {
                return Err(AuthError::authorization("Invalid token"));
            }
        };

        if claims.is_user_role() && !claims.is_request_verified_with_token_claims(params) {
            debug!(username = %claims.username, route = %route_name, "Identity parameters do not match token");
            return Err(AuthError::authorization(
                "request not verified with the token claims",
            ));
        }

        if !self.permissions.is_authorized_for(claims.role, route_name) {
            return Err(AuthError::authorization(format!(
                "{} role is not authorized",
                claims.role
            )));
        }

        Ok(())
    }

    /// Exchange an expired access token and a registered refresh token for a new access token.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<RefreshResponse, AuthError> {
        match self.jwt.decode_access_token(access_token) {
            AccessTokenStatus::Valid(_) => Err(AuthError::authorization(
                "cannot generate a new access token until the current one expires",
            )),
            AccessTokenStatus::Invalid => Err(AuthError::authentication("invalid token")),
            AccessTokenStatus::Expired => {
                self.repo.refresh_token_exists(refresh_token).await?;

                let refresh_claims =
                    self.jwt
                        .validate_refresh_token(refresh_token)
                        .map_err(|e| {
                            warn!(error = %e, "Stored refresh token failed validation");
                            AuthError::authentication("invalid refresh token")
                        })?;

                let claims = self
                    .jwt
                    .claims_from_refresh(&refresh_claims)
                    .map_err(signing_error)?;
                let access_token = self
                    .jwt
                    .generate_access_token(&claims)
                    .map_err(signing_error)?;

                info!(username = %claims.username, "Access token refreshed");

                Ok(RefreshResponse { access_token })
            }
        }
    }
}

fn signing_error(e: JwtError) -> AuthError {
    error!("Failed to generate token: {}", e);
    AuthError::unexpected("Failed to generate token")
}
