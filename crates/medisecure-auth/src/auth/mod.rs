//! Authentication module.
//!
//! Provides the authentication core:
//! - bcrypt credential verification against a [`CredentialStore`](crate::user::CredentialStore)
//! - HMAC-signed JWT issuance and verification with injectable time
//! - a development fallback credential gated by an explicit flag

mod claims;
mod clock;
mod config;
mod error;
mod header;
mod password;
mod revocation;
mod service;
mod token;

pub use claims::Claims;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AuthConfig, ConfigError, DEFAULT_DEV_FALLBACK_SECRET, DeploymentMode, MAX_TOKEN_LIFETIME_MINUTES,
    MIN_JWT_SECRET_LEN, SigningAlgorithm,
};
pub use error::{AuthError, AuthErrorResponse, AuthResult};
pub use header::bearer_token_from_header;
pub use password::{DEFAULT_BCRYPT_COST, MAX_SECRET_BYTES, PasswordHasher};
pub use revocation::{NeverRevoked, RevocationCheck};
pub use service::{AuthService, IssuedToken, LoginResponse, TOKEN_TYPE};
pub use token::TokenCodec;
