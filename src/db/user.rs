use sqlx::sqlite::SqlitePool;

use crate::auth::Login;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    username: String,
    role: String,
    customer_id: Option<String>,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. Returns the user ID.
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
        customer_id: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (username, password, role, customer_id) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password)
        .bind(role.as_str())
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Register an account as owned by a customer.
    pub async fn add_account(&self, account_id: &str, customer_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO accounts (account_id, customer_id) VALUES (?, ?)")
            .bind(account_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Look up a user by credentials, together with the accounts its customer owns.
    /// Returns `None` when the username/password pair does not match.
    pub async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Login>, sqlx::Error> {
        let row: Option<LoginRow> = sqlx::query_as(
            "SELECT username, role, customer_id FROM users WHERE username = ? AND password = ?",
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        let accounts = match row.customer_id.as_deref() {
            Some(customer_id) => self.list_accounts(customer_id).await?,
            None => Vec::new(),
        };

        Ok(Some(Login {
            username: row.username,
            customer_id: row.customer_id,
            accounts,
            role,
        }))
    }

    /// List account IDs owned by a customer.
    pub async fn list_accounts(&self, customer_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT account_id FROM accounts WHERE customer_id = ? ORDER BY account_id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
