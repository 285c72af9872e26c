//! bcrypt password hashing.
//!
//! Hashing and verification are CPU-bound by design. The async variants move
//! the work onto tokio's blocking pool so request tasks keep running.

use tracing::debug;

use super::config::ConfigError;
use super::error::{AuthError, AuthResult};

/// Default bcrypt cost factor (2^12 rounds).
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

pub(crate) const MIN_BCRYPT_COST: u32 = 4;
pub(crate) const MAX_BCRYPT_COST: u32 = 31;

/// Longest secret bcrypt covers. Longer input would be silently truncated,
/// so it is refused instead.
pub const MAX_SECRET_BYTES: usize = 72;

/// Salted adaptive password hasher.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with the given cost factor.
    pub fn new(cost: u32) -> Result<Self, ConfigError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(ConfigError::InvalidBcryptCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext secret with a fresh salt.
    ///
    /// Secrets longer than [`MAX_SECRET_BYTES`] fail with
    /// [`AuthError::InvalidRequest`].
    pub fn hash(&self, plaintext: &str) -> AuthResult<String> {
        if plaintext.len() > MAX_SECRET_BYTES {
            return Err(AuthError::InvalidRequest(format!(
                "secret must be at most {MAX_SECRET_BYTES} bytes"
            )));
        }
        bcrypt::hash(plaintext, self.cost)
            .map_err(|e| AuthError::Internal(format!("failed to hash password: {e}")))
    }

    /// Verify a plaintext secret against a stored hash.
    ///
    /// Uses bcrypt's own comparison. A malformed hash or a secret longer than
    /// [`MAX_SECRET_BYTES`] verifies as `false`.
    pub fn verify(plaintext: &str, hash: &str) -> bool {
        if plaintext.len() > MAX_SECRET_BYTES {
            debug!(len = plaintext.len(), "secret exceeds bcrypt input limit");
            return false;
        }
        match bcrypt::verify(plaintext, hash) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "stored password hash could not be parsed");
                false
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plaintext: String) -> AuthResult<String> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {e}")))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(plaintext: String, hash: String) -> AuthResult<bool> {
        tokio::task::spawn_blocking(move || Self::verify(&plaintext, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))
    }
}
