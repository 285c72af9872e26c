//! Authentication configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::password::{DEFAULT_BCRYPT_COST, MAX_BCRYPT_COST, MAX_SECRET_BYTES, MIN_BCRYPT_COST};

/// Minimum accepted length of the JWT signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted default token lifetime (one year).
pub const MAX_TOKEN_LIFETIME_MINUTES: u64 = 60 * 24 * 365;

/// Plaintext accepted by the development fallback when nothing else is configured.
pub const DEFAULT_DEV_FALLBACK_SECRET: &str = "Admin123!";

/// Placeholder secret shipped in old service templates. Never accepted.
const INSECURE_DEFAULT_SECRET: &str = "your-secret-key-here-change-in-production-PLEASE";

/// Deployment mode of the hosting service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Development,
    Staging,
    #[default]
    Production,
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentMode::Development => write!(f, "development"),
            DeploymentMode::Staging => write!(f, "staging"),
            DeploymentMode::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(DeploymentMode::Development),
            "staging" => Ok(DeploymentMode::Staging),
            "production" | "prod" => Ok(DeploymentMode::Production),
            _ => Err(format!("unknown deployment mode: {}", s)),
        }
    }
}

/// HMAC algorithm used to sign tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl SigningAlgorithm {
    pub(crate) fn to_jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            SigningAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            SigningAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            SigningAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningAlgorithm::HS256 => write!(f, "HS256"),
            SigningAlgorithm::HS384 => write!(f, "HS384"),
            SigningAlgorithm::HS512 => write!(f, "HS512"),
        }
    }
}

impl std::str::FromStr for SigningAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::HS256),
            "HS384" => Ok(SigningAlgorithm::HS384),
            "HS512" => Ok(SigningAlgorithm::HS512),
            _ => Err(ConfigError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Authentication configuration.
///
/// Built once at process start and moved into
/// [`AuthService::new`](super::AuthService::new); the core never reads the
/// environment on its own except to resolve an explicit `env:VAR_NAME`
/// reference in `jwt_secret`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret. Required, at least 32 characters.
    /// `env:VAR_NAME` reads the secret from that environment variable.
    pub jwt_secret: Option<String>,

    /// Signing algorithm: "HS256", "HS384" or "HS512".
    pub jwt_algorithm: String,

    /// Default access token lifetime in minutes, 1..=525600.
    pub access_token_expire_minutes: u64,

    /// bcrypt cost factor used by `hash_secret` and the timing dummy.
    pub bcrypt_cost: u32,

    /// Deployment mode. The development fallback is refused in production.
    pub deployment_mode: DeploymentMode,

    /// Accept `dev_fallback_secret` for any active account outside production.
    pub allow_dev_fallback: bool,

    /// Plaintext accepted by the development fallback.
    pub dev_fallback_secret: String,

    /// Upper bound on a credential store lookup, in seconds.
    pub lookup_timeout_secs: u64,

    /// Optional `iss` claim written into and required from tokens.
    pub issuer: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No default secret - must be explicitly configured
            jwt_secret: None,
            jwt_algorithm: SigningAlgorithm::HS256.to_string(),
            access_token_expire_minutes: 30,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            deployment_mode: DeploymentMode::Production,
            allow_dev_fallback: false,
            dev_fallback_secret: DEFAULT_DEV_FALLBACK_SECRET.to_string(),
            lookup_timeout_secs: 5,
            issuer: None,
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved secret or None if not configured.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Resolve and check the signing secret.
    pub fn signing_secret(&self) -> Result<String, ConfigError> {
        let secret = self
            .resolve_jwt_secret()?
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingJwtSecret)?;

        if secret == INSECURE_DEFAULT_SECRET {
            return Err(ConfigError::InsecureJwtSecret);
        }
        if secret.chars().count() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::JwtSecretTooShort);
        }

        Ok(secret)
    }

    /// Parse the configured signing algorithm.
    pub fn signing_algorithm(&self) -> Result<SigningAlgorithm, ConfigError> {
        self.jwt_algorithm.parse()
    }

    /// Default access token lifetime.
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes.saturating_mul(60))
    }

    /// Upper bound on a credential store lookup.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    /// Whether the development fallback credential may be accepted.
    pub fn dev_fallback_permitted(&self) -> bool {
        self.allow_dev_fallback
            && self.deployment_mode != DeploymentMode::Production
            && !self.dev_fallback_secret.is_empty()
    }

    /// Validate the configuration.
    ///
    /// Every failure here is fatal at startup; nothing is re-checked per call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signing_secret()?;
        self.signing_algorithm()?;

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.bcrypt_cost));
        }
        if !(1..=MAX_TOKEN_LIFETIME_MINUTES).contains(&self.access_token_expire_minutes) {
            return Err(ConfigError::InvalidTokenLifetime);
        }
        if self.lookup_timeout_secs == 0 {
            return Err(ConfigError::InvalidLookupTimeout);
        }
        if self.dev_fallback_permitted() && self.dev_fallback_secret.len() > MAX_SECRET_BYTES {
            return Err(ConfigError::DevFallbackSecretTooLong);
        }

        Ok(())
    }

    /// Generate a secure random JWT secret.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Copy of this configuration with the secret masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy
            .jwt_secret
            .as_deref()
            .is_some_and(|s| !s.starts_with("env:"))
        {
            copy.jwt_secret = Some("********".to_string());
        }
        copy.dev_fallback_secret = "********".to_string();
        copy
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("JWT secret is required. Set jwt_secret in the auth configuration.")]
    MissingJwtSecret,

    #[error("JWT secret cannot be the default placeholder value. Please configure a secure secret.")]
    InsecureJwtSecret,

    #[error("JWT secret must be at least 32 characters long.")]
    JwtSecretTooShort,

    #[error("unsupported signing algorithm '{0}'. Must be HS256, HS384 or HS512.")]
    UnsupportedAlgorithm(String),

    #[error("bcrypt cost {0} is out of range (4..=31).")]
    InvalidBcryptCost(u32),

    #[error("access_token_expire_minutes must be between 1 and 525600 (one year).")]
    InvalidTokenLifetime,

    #[error("lookup_timeout_secs must be > 0.")]
    InvalidLookupTimeout,

    #[error("dev_fallback_secret must be at most 72 bytes.")]
    DevFallbackSecretTooLong,

    #[error("Environment variable '{0}' not found (referenced via env:{0} in config).")]
    EnvVarNotFound(String),

    #[error("Environment variable '{0}' is empty (referenced via env:{0} in config).")]
    EnvVarEmpty(String),
}
