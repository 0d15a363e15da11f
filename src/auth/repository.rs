//! Storage capabilities the auth service depends on.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::claims::Login;
use super::errors::AuthError;
use crate::jwt::RefreshTokenResult;

/// Credential lookup and refresh token persistence.
///
/// Implementations own their own concurrency control; a refresh token saved
/// by `save_refresh_token` must be visible to a later `refresh_token_exists`.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// Find the principal for a username/password pair.
    async fn find_by(&self, username: &str, password: &str) -> Result<Login, AuthError>;

    /// Persist a newly issued refresh token.
    async fn save_refresh_token(&self, refresh: &RefreshTokenResult) -> Result<(), AuthError>;

    /// `Ok` if the refresh token was issued by us and is still usable.
    async fn refresh_token_exists(&self, refresh_token: &str) -> Result<(), AuthError>;
}

/// Repository kept entirely in memory. Useful for tests and embedding.
#[derive(Default)]
pub struct MemoryAuthRepository {
    users: RwLock<HashMap<String, (String, Login)>>,
    refresh_tokens: RwLock<HashSet<String>>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal with its password. Replaces an existing user with the same name.
    pub async fn add_user(&self, password: &str, login: Login) {
        self.users
            .write()
            .await
            .insert(login.username.clone(), (password.to_string(), login));
    }

    /// Forget a refresh token, as if it had never been issued.
    pub async fn remove_refresh_token(&self, refresh_token: &str) -> bool {
        self.refresh_tokens.write().await.remove(refresh_token)
    }

    /// Number of refresh tokens currently stored.
    pub async fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.read().await.len()
    }
}

#[async_trait]
impl AuthRepository for MemoryAuthRepository {
    async fn find_by(&self, username: &str, password: &str) -> Result<Login, AuthError> {
        let users = self.users.read().await;
        match users.get(username) {
            Some((stored, login)) if stored == password => Ok(login.clone()),
            _ => Err(AuthError::authentication("invalid credentials")),
        }
    }

    async fn save_refresh_token(&self, refresh: &RefreshTokenResult) -> Result<(), AuthError> {
        self.refresh_tokens
            .write()
            .await
            .insert(refresh.token.clone());
        Ok(())
    }

    async fn refresh_token_exists(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self.refresh_tokens.read().await.contains(refresh_token) {
            Ok(())
        } else {
            Err(AuthError::authentication(
                "refresh token not registered in the store",
            ))
        }
    }
}
