//! Token claims and the identity checks made against them.

use serde::{Deserialize, Serialize};

use crate::db::UserRole;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token - stateless, never stored
    Access,
    /// Long-lived refresh token - tracked in the store with JTI
    Refresh,
}

/// An authenticated principal, as produced by the credential lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    /// Customer the user acts for. `None` for staff accounts.
    pub customer_id: Option<String>,
    /// Accounts owned by the customer
    pub accounts: Vec<String>,
    pub role: UserRole,
}

/// Identity parameters carried by a request, e.g. from the route path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityParams {
    pub customer_id: Option<String>,
    pub account_id: Option<String>,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    pub username: String,
    pub role: UserRole,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens. Carries the same identity as the access
/// token it was issued with, so a new access token can be derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID (unique per refresh token)
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
    pub username: String,
    pub role: UserRole,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

impl AccessClaims {
    /// Claims for a freshly authenticated principal, valid for `ttl` seconds from `now`.
    pub fn for_login(login: &Login, now: u64, ttl: u64) -> Self {
        Self {
            customer_id: login.customer_id.clone(),
            accounts: login.accounts.clone(),
            username: login.username.clone(),
            role: login.role,
            token_type: TokenType::Access,
            iat: now,
            exp: now.saturating_add(ttl),
        }
    }

    /// Claims re-derived from a refresh token, with a renewed expiry.
    pub fn from_refresh(refresh: &RefreshClaims, now: u64, ttl: u64) -> Self {
        Self {
            customer_id: refresh.customer_id.clone(),
            accounts: refresh.accounts.clone(),
            username: refresh.username.clone(),
            role: refresh.role,
            token_type: TokenType::Access,
            iat: now,
            exp: now.saturating_add(ttl),
        }
    }

    /// Whether the token belongs to a plain user. Elevated roles skip ownership checks.
    pub fn is_user_role(&self) -> bool {
        self.role == UserRole::User
    }

    /// Whether `account_id` is one of the accounts in the token.
    pub fn is_valid_account_id(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|a| a == account_id)
    }

    /// Check the request's identity parameters against the token.
    ///
    /// Parameters absent from the request (or empty) are not checked. A
    /// parameter the request carries but the token lacks is a mismatch.
    pub fn is_request_verified_with_token_claims(&self, params: &IdentityParams) -> bool {
        if let Some(customer_id) = non_empty(&params.customer_id) {
            if self.customer_id.as_deref() != Some(customer_id) {
                return false;
            }
        }

        if let Some(account_id) = non_empty(&params.account_id) {
            if !self.is_valid_account_id(account_id) {
                return false;
            }
        }

        true
    }
}

impl RefreshClaims {
    /// Refresh claims for the identity in `claims`, valid for `ttl` seconds from `now`.
    pub fn for_access_claims(claims: &AccessClaims, jti: String, now: u64, ttl: u64) -> Self {
        Self {
            jti,
            customer_id: claims.customer_id.clone(),
            accounts: claims.accounts.clone(),
            username: claims.username.clone(),
            role: claims.role,
            token_type: TokenType::Refresh,
            iat: now,
            exp: now.saturating_add(ttl),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
