//! Token based authentication with role-based route access.
//!
//! Dual-token system: short-lived access tokens (stateless) and long-lived
//! refresh tokens (registered with the repository). An expired access token
//! can be exchanged for a new one while its refresh token is still registered.

mod claims;
mod errors;
mod permissions;
mod repository;
mod service;

pub use claims::{AccessClaims, IdentityParams, Login, RefreshClaims, TokenType};
pub use errors::AuthError;
pub use permissions::RolePermissions;
pub use repository::{AuthRepository, MemoryAuthRepository};
pub use service::{AuthService, LoginResponse, RefreshResponse};
