//! SQLite credential store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::Account;
use super::store::{CredentialStore, StoreResult, normalize_identifier};

const SELECT_ACCOUNT: &str = r#"
    SELECT id, email, password_hash, first_name, last_name, role, is_active,
           created_at, updated_at
    FROM accounts
    WHERE email_lower = ?
"#;

/// Credential store backed by the `accounts` table.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Create a new store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an account row. Seeding and tooling only; the authentication
    /// core never writes.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn insert(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, email_lower, password_hash, first_name, last_name,
                                  role, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(normalize_identifier(&account.email))
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.role)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %account.id, "account inserted");
        Ok(())
    }

    /// Flip the active flag. Returns false when no row matched.
    #[instrument(skip(self))]
    pub async fn set_active(&self, identifier: &str, active: bool) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET is_active = ?, updated_at = ? WHERE email_lower = ?",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(normalize_identifier(identifier))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    #[instrument(skip(self))]
    async fn lookup_by_identifier(&self, identifier: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(SELECT_ACCOUNT)
            .bind(normalize_identifier(identifier))
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
