//! JWT token generation and validation.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{AccessClaims, Login, RefreshClaims, TokenType};

/// Access token duration: 1 hour
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 60 * 60;

/// Refresh token duration: 30 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound for configured token lifetimes: 10 years
pub const MAX_TOKEN_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: u64,
    refresh_ttl: u64,
}

/// Result of generating a refresh token (with JTI for tracking).
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    /// The JWT token string
    pub token: String,
    /// JWT ID (unique identifier for store tracking)
    pub jti: String,
    /// Owner of the token
    pub username: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Outcome of decoding an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenStatus {
    /// Signature checks out and the token has not expired.
    Valid(AccessClaims),
    /// Signature checks out but the expiry has passed.
    Expired,
    /// Malformed, forged, or not an access token.
    Invalid,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_durations(
            secret,
            ACCESS_TOKEN_DURATION_SECS,
            REFRESH_TOKEN_DURATION_SECS,
        )
    }

    /// Create a JWT configuration with explicit token lifetimes in seconds.
    pub fn with_durations(secret: &[u8], access_ttl: u64, refresh_ttl: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build access claims for a principal, expiring one access lifetime from now.
    pub fn claims_for_login(&self, login: &Login) -> Result<AccessClaims, JwtError> {
        Ok(AccessClaims::for_login(login, unix_now()?, self.access_ttl))
    }

    /// Build fresh access claims from a validated refresh token.
    pub fn claims_from_refresh(&self, refresh: &RefreshClaims) -> Result<AccessClaims, JwtError> {
        Ok(AccessClaims::from_refresh(refresh, unix_now()?, self.access_ttl))
    }

    /// Sign access claims into a token.
    pub fn generate_access_token(&self, claims: &AccessClaims) -> Result<String, JwtError> {
        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Generate a refresh token for the identity carried by `claims`.
    /// Refresh tokens are long-lived and must be tracked by the store.
    pub fn generate_refresh_token(
        &self,
        claims: &AccessClaims,
    ) -> Result<RefreshTokenResult, JwtError> {
        let now = unix_now()?;
        let jti = uuid::Uuid::new_v4().to_string();
        let refresh = RefreshClaims::for_access_claims(claims, jti.clone(), now, self.refresh_ttl);

        let token = jsonwebtoken::encode(&Header::default(), &refresh, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            jti,
            username: refresh.username,
            issued_at: now,
            expires_at: refresh.exp,
        })
    }

    /// Decode an access token, telling an expired token apart from an invalid one.
    ///
    /// A token is `Expired` only if its signature verifies and it is an access
    /// token; the expiry boundary is inclusive (`now >= exp`).
    pub fn decode_access_token(&self, token: &str) -> AccessTokenStatus {
        match self.decode::<AccessClaims>(token, true) {
            Ok(claims) if claims.token_type == TokenType::Access => match unix_now() {
                Ok(now) if now < claims.exp => AccessTokenStatus::Valid(claims),
                Ok(_) => AccessTokenStatus::Expired,
                Err(_) => AccessTokenStatus::Invalid,
            },
            Ok(_) => AccessTokenStatus::Invalid,
            Err(JwtError::Decoding(e)) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                // Signature was verified before the expiry check; make sure the
                // expired token is an access token and not a stale refresh token.
                match self.decode::<AccessClaims>(token, false) {
                    Ok(claims) if claims.token_type == TokenType::Access => {
                        AccessTokenStatus::Expired
                    }
                    _ => AccessTokenStatus::Invalid,
                }
            }
            Err(e) => {
                tracing::debug!("Rejected access token: {}", e);
                AccessTokenStatus::Invalid
            }
        }
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims = self.decode::<RefreshClaims>(token, true)?;

        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str, validate_exp: bool) -> Result<T, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;

        let token_data = jsonwebtoken::decode::<T>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;

        Ok(token_data.claims)
    }
}

/// Current time as Unix seconds.
fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
