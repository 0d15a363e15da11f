//! Refresh token storage.
//!
//! Only refresh tokens are stored. Access tokens are stateless and never
//! written to the database.

use sqlx::sqlite::SqlitePool;

/// Store for managing issued refresh tokens.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a newly issued refresh token.
    /// Timestamps are Unix seconds and stored as SQLite datetimes; values that
    /// do not fit an `i64` are rejected.
    pub async fn create(
        &self,
        token: &str,
        jti: &str,
        username: &str,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let issued_at = unix_seconds(issued_at)?;
        let expires_at = unix_seconds(expires_at)?;

        let result = sqlx::query(
            "INSERT INTO refresh_tokens (token, jti, username, issued_at, expires_at) VALUES (?, ?, ?, datetime(?, 'unixepoch'), datetime(?, 'unixepoch'))",
        )
        .bind(token)
        .bind(jti)
        .bind(username)
        .bind(issued_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Check whether an unexpired refresh token with this exact value is stored.
    pub async fn exists(&self, token: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM refresh_tokens WHERE token = ? AND expires_at >= datetime('now')",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Delete all expired tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn unix_seconds(timestamp: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(timestamp).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}
