//! Credential store trait and the in-memory adapter.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::models::Account;

/// Result type for credential store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a credential store can report.
///
/// None of these mean "wrong password"; the service surfaces them as
/// `StoreUnavailable`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// The lookup did not finish in time.
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Canonical form of a login identifier: trimmed and Unicode-lowercased.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Read access to accounts by login identifier.
///
/// Implementations compare [`normalize_identifier`] forms, so matching is
/// case-insensitive beyond ASCII, and return the account together with its
/// password hash.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an account. `Ok(None)` means no such account.
    async fn lookup_by_identifier(&self, identifier: &str) -> StoreResult<Option<Account>>;

    /// Human-readable store name for logs.
    fn name(&self) -> &'static str {
        "credential-store"
    }
}

/// Concurrent in-memory store keyed by normalized email.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    accounts: DashMap<String, Account>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(normalize_identifier(&account.email), account);
    }

    /// Remove an account by identifier.
    pub fn remove(&self, identifier: &str) -> Option<Account> {
        self.accounts
            .remove(&normalize_identifier(identifier))
            .map(|(_, account)| account)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<Account> for InMemoryCredentialStore {
    fn from_iter<I: IntoIterator<Item = Account>>(iter: I) -> Self {
        let store = Self::new();
        for account in iter {
            store.insert(account);
        }
        store
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup_by_identifier(&self, identifier: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts
            .get(&normalize_identifier(identifier))
            .map(|entry| entry.value().clone()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::AccountRole;
    use chrono::Utc;

    fn account(email: &str) -> Account {
        let now = Utc::now();
        Account {
            id: format!("acc_{email}"),
            email: email.to_string(),
            password_hash: "$2b$04$placeholder".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role: AccountRole::Staff,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let store: InMemoryCredentialStore = [account("Nurse@Example.com")].into_iter().collect();

        let found = store
            .lookup_by_identifier("nurse@example.COM")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.email, "Nurse@Example.com");
        assert!(store.lookup_by_identifier("other@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_folds_non_ascii_case() {
        let store: InMemoryCredentialStore = [account("Élodie@Example.com")].into_iter().collect();

        for identifier in ["élodie@example.com", " ÉLODIE@EXAMPLE.COM "] {
            let found = store.lookup_by_identifier(identifier).await.unwrap();
            assert_eq!(found.unwrap().email, "Élodie@Example.com");
        }
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("  Nurse@Example.COM "), "nurse@example.com");
        assert_eq!(normalize_identifier("ÉLODIE@example.com"), "élodie@example.com");
    }

    #[tokio::test]
    async fn test_insert_replaces_and_remove() {
        let store = InMemoryCredentialStore::new();
        store.insert(account("a@example.com"));
        let mut updated = account("A@example.com");
        updated.is_active = false;
        store.insert(updated);
        assert_eq!(store.len(), 1);

        let found = store.lookup_by_identifier("a@example.com").await.unwrap().unwrap();
        assert!(!found.is_active);

        assert!(store.remove("A@EXAMPLE.COM").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "lookup timed out after 5s");

        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
