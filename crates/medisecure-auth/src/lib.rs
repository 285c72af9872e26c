//! MediSecure authentication core.
//!
//! Credential verification against a pluggable account store, bcrypt password
//! hashing, and HMAC-signed JWT issuance and verification.

pub mod auth;
pub mod db;
pub mod user;

pub use auth::{
    AuthConfig, AuthError, AuthResult, AuthService, Claims, ConfigError, DeploymentMode,
    IssuedToken, LoginResponse, SigningAlgorithm,
};
pub use user::{Account, AccountRole, AccountSummary, CredentialStore, StoreError};
