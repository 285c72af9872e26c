//! Accounts and the credential store seam.
//!
//! The authentication core only ever reads accounts. Persistence lives
//! behind [`CredentialStore`]; two adapters ship with the crate.

mod models;
mod repository;
mod store;

pub use models::{Account, AccountRole, AccountSummary};
pub use repository::SqliteCredentialStore;
pub use store::{
    CredentialStore, InMemoryCredentialStore, StoreError, StoreResult, normalize_identifier,
};
