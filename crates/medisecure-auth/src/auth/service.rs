//! Authentication service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::claims::Claims;
use super::clock::{Clock, SystemClock};
use super::config::{AuthConfig, DeploymentMode};
use super::error::{AuthError, AuthResult};
use super::password::{MAX_SECRET_BYTES, PasswordHasher};
use super::revocation::{NeverRevoked, RevocationCheck};
use super::token::TokenCodec;
use crate::user::{Account, AccountSummary, CredentialStore, StoreError};

/// Token type reported in login responses.
pub const TOKEN_TYPE: &str = "bearer";

/// Plaintext behind the timing dummy hash. Never matches a real login: the
/// dummy is only ever checked for accounts that cannot authenticate.
const TIMING_DUMMY_PLAINTEXT: &str = "medisecure-timing-equalizer";

/// A freshly signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: AccountSummary,
}

/// Authentication service.
///
/// Cheap to clone; every clone shares the same store, keys and clock.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
    revocation: Arc<dyn RevocationCheck>,
    default_ttl: Duration,
    lookup_timeout: Duration,
    deployment_mode: DeploymentMode,
    issuer: Option<String>,
    dummy_hash: Arc<str>,
    dev_fallback_hash: Option<Arc<str>>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("codec", &self.codec)
            .field("bcrypt_cost", &self.hasher.cost())
            .field("default_ttl", &self.default_ttl)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("deployment_mode", &self.deployment_mode)
            .field("dev_fallback", &self.dev_fallback_hash.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Build the service from a configuration and a credential store.
    ///
    /// Validates the configuration; any problem is returned as
    /// [`AuthError::Misconfigured`] and nothing is checked again per call.
    pub fn new(config: AuthConfig, store: Arc<dyn CredentialStore>) -> AuthResult<Self> {
        config.validate()?;

        let secret = config.signing_secret()?;
        let algorithm = config.signing_algorithm()?;
        let hasher = PasswordHasher::new(config.bcrypt_cost)?;
        let codec = TokenCodec::new(&secret, algorithm, config.issuer.clone());

        let dummy_hash: Arc<str> = hasher.hash(TIMING_DUMMY_PLAINTEXT)?.into();

        let dev_fallback_hash: Option<Arc<str>> = if config.dev_fallback_permitted() {
            warn!(
                mode = %config.deployment_mode,
                "development fallback credential is ENABLED; never use this in production"
            );
            Some(hasher.hash(&config.dev_fallback_secret)?.into())
        } else {
            if config.allow_dev_fallback {
                warn!(
                    mode = %config.deployment_mode,
                    "allow_dev_fallback is set but refused in this deployment mode"
                );
            }
            None
        };

        info!(
            algorithm = %algorithm,
            bcrypt_cost = hasher.cost(),
            ttl_minutes = config.access_token_expire_minutes,
            mode = %config.deployment_mode,
            "authentication service initialized"
        );

        Ok(Self {
            store,
            codec: Arc::new(codec),
            hasher,
            clock: Arc::new(SystemClock),
            revocation: Arc::new(NeverRevoked),
            default_ttl: config.access_token_lifetime(),
            lookup_timeout: config.lookup_timeout(),
            deployment_mode: config.deployment_mode,
            issuer: config.issuer,
            dummy_hash,
            dev_fallback_hash,
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install a revocation check consulted by [`verify_token`](Self::verify_token).
    pub fn with_revocation_check(mut self, check: Arc<dyn RevocationCheck>) -> Self {
        self.revocation = check;
        self
    }

    pub fn default_token_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn deployment_mode(&self) -> DeploymentMode {
        self.deployment_mode
    }

    /// Whether the development fallback credential is active.
    pub fn dev_fallback_active(&self) -> bool {
        self.dev_fallback_hash.is_some()
    }

    /// Verify an identifier/secret pair and return the matching account.
    ///
    /// Unknown identifier, inactive account, wrong secret, a secret longer
    /// than [`MAX_SECRET_BYTES`] and empty input all fail with the same
    /// [`AuthError::InvalidCredentials`].
    #[instrument(skip(self, plaintext))]
    pub async fn authenticate(&self, identifier: &str, plaintext: &str) -> AuthResult<Account> {
        let identifier = identifier.trim();
        if identifier.is_empty() || plaintext.is_empty() {
            debug!("empty identifier or secret");
            return Err(AuthError::InvalidCredentials);
        }

        let account = match self.lookup(identifier).await? {
            Some(account) if account.is_active && plaintext.len() <= MAX_SECRET_BYTES => account,
            other => {
                self.spend_rejection_work(plaintext).await?;
                debug!(
                    found = other.is_some(),
                    secret_too_long = plaintext.len() > MAX_SECRET_BYTES,
                    "authentication rejected"
                );
                return Err(AuthError::InvalidCredentials);
            }
        };

        if PasswordHasher::verify_blocking(plaintext.to_string(), account.password_hash.clone())
            .await?
        {
            info!(user_id = %account.id, role = %account.role, "authenticated");
            return Ok(account);
        }

        if self.dev_fallback_matches(plaintext).await? {
            warn!(
                user_id = %account.id,
                mode = %self.deployment_mode,
                "authenticated with development fallback credential"
            );
            return Ok(account);
        }

        debug!(user_id = %account.id, "password mismatch");
        Err(AuthError::InvalidCredentials)
    }

    /// Sign an access token for `account`.
    ///
    /// `ttl` of `None` uses the configured default. Lifetimes under one second
    /// are rejected with [`AuthError::InvalidRequest`].
    #[instrument(skip(self, account), fields(user_id = %account.id))]
    pub fn issue_token(&self, account: &Account, ttl: Option<Duration>) -> AuthResult<IssuedToken> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.as_secs() == 0 {
            return Err(AuthError::InvalidRequest(
                "token lifetime must be at least one second".to_string(),
            ));
        }

        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::InvalidRequest("token lifetime out of range".to_string()))?;

        let claims = Claims::for_account(account, now, expires_at, self.issuer.clone());
        let access_token = self.codec.encode(&claims)?;

        debug!(jti = %claims.jti, exp = claims.exp, "token issued");

        Ok(IssuedToken {
            access_token,
            expires_in: ttl.as_secs(),
            expires_at: claims.expires_at().unwrap_or(expires_at),
        })
    }

    /// Verify a token and return its claims.
    ///
    /// Signature first, then expiry, then the revocation check. Never touches
    /// the credential store.
    #[instrument(skip_all)]
    pub fn verify_token(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.codec.decode(token)?;

        if claims.is_expired_at(self.clock.now()) {
            debug!(user_id = %claims.user_id, exp = claims.exp, "token expired");
            return Err(AuthError::Expired);
        }

        if self.revocation.is_revoked(&claims) {
            info!(user_id = %claims.user_id, jti = %claims.jti, "revoked token presented");
            return Err(AuthError::Revoked);
        }

        Ok(claims)
    }

    /// Hash a plaintext secret with the configured cost.
    ///
    /// Empty secrets and secrets longer than [`MAX_SECRET_BYTES`] fail with
    /// [`AuthError::InvalidRequest`].
    #[instrument(skip_all)]
    pub async fn hash_secret(&self, plaintext: &str) -> AuthResult<String> {
        if plaintext.is_empty() {
            return Err(AuthError::InvalidRequest(
                "secret must not be empty".to_string(),
            ));
        }
        self.hasher.hash_blocking(plaintext.to_string()).await
    }

    /// Check a plaintext secret against a stored hash.
    ///
    /// Malformed hashes verify as `false`.
    #[instrument(skip_all)]
    pub async fn verify_secret(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHasher::verify_blocking(plaintext.to_string(), hash.to_string()).await {
            Ok(valid) => valid,
            Err(e) => {
                error!(error = %e, "password verification failed");
                false
            }
        }
    }

    /// Authenticate and issue a token with the default lifetime.
    #[instrument(skip(self, plaintext))]
    pub async fn login(&self, identifier: &str, plaintext: &str) -> AuthResult<LoginResponse> {
        let account = self.authenticate(identifier, plaintext).await?;
        let issued = self.issue_token(&account, None)?;

        Ok(LoginResponse {
            access_token: issued.access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: issued.expires_in,
            user: AccountSummary::from(&account),
        })
    }

    async fn lookup(&self, identifier: &str) -> AuthResult<Option<Account>> {
        let lookup = self.store.lookup_by_identifier(identifier);
        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(account)) => Ok(account),
            Ok(Err(e)) => {
                error!(store = self.store.name(), error = %e, "credential store lookup failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    store = self.store.name(),
                    timeout_secs = self.lookup_timeout.as_secs(),
                    "credential store lookup timed out"
                );
                Err(StoreError::Timeout(self.lookup_timeout).into())
            }
        }
    }

    /// Hashes checked when an attempt is rejected before its stored hash is
    /// read. Same count as a wrong secret against a real account.
    fn rejection_hashes(&self) -> impl Iterator<Item = &Arc<str>> {
        std::iter::once(&self.dummy_hash).chain(self.dev_fallback_hash.as_ref())
    }

    async fn spend_rejection_work(&self, plaintext: &str) -> AuthResult<()> {
        let plaintext = if plaintext.len() > MAX_SECRET_BYTES {
            TIMING_DUMMY_PLAINTEXT
        } else {
            plaintext
        };
        for hash in self.rejection_hashes() {
            PasswordHasher::verify_blocking(plaintext.to_string(), hash.to_string()).await?;
        }
        Ok(())
    }

    async fn dev_fallback_matches(&self, plaintext: &str) -> AuthResult<bool> {
        match &self.dev_fallback_hash {
            Some(hash) => {
                PasswordHasher::verify_blocking(plaintext.to_string(), hash.to_string()).await
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use crate::user::InMemoryCredentialStore;

    fn config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some("unit-test-secret-that-is-long-enough-for-hs256".to_string());
        config.bcrypt_cost = 4;
        config
    }

    fn service(config: AuthConfig) -> AuthResult<AuthService> {
        AuthService::new(config, Arc::new(InMemoryCredentialStore::new()))
    }

    #[test]
    fn test_service_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<AuthService>();
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let mut bad = config();
        bad.jwt_secret = Some("short".to_string());
        assert!(matches!(service(bad), Err(AuthError::Misconfigured(_))));

        let mut bad = config();
        bad.jwt_algorithm = "none".to_string();
        assert!(matches!(service(bad), Err(AuthError::Misconfigured(_))));
    }

    #[test]
    fn test_dev_fallback_gating() {
        let mut cfg = config();
        cfg.allow_dev_fallback = true;
        assert!(!service(cfg.clone()).unwrap().dev_fallback_active());

        cfg.deployment_mode = DeploymentMode::Development;
        assert!(service(cfg).unwrap().dev_fallback_active());

        assert!(!service(config()).unwrap().dev_fallback_active());
    }

    #[test]
    fn test_debug_omits_secrets() {
        let svc = service(config()).unwrap();
        let debug = format!("{svc:?}");
        assert!(!debug.contains("unit-test-secret"));
        assert!(!debug.contains("$2b$"));
    }

    #[test]
    fn test_rejection_work_matches_wrong_secret_work() {
        // A wrong secret on a real account checks the stored hash plus the
        // fallback hash when one is active.
        let svc = service(config()).unwrap();
        assert_eq!(svc.rejection_hashes().count(), 1);

        let mut cfg = config();
        cfg.allow_dev_fallback = true;
        cfg.deployment_mode = DeploymentMode::Development;
        let svc = service(cfg).unwrap();
        assert_eq!(svc.rejection_hashes().count(), 2);
    }

    #[tokio::test]
    async fn test_hash_secret_rejects_over_long() {
        let svc = service(config()).unwrap();
        assert!(matches!(
            svc.hash_secret(&"s".repeat(MAX_SECRET_BYTES + 1)).await,
            Err(AuthError::InvalidRequest(_))
        ));
        assert!(svc.hash_secret(&"s".repeat(MAX_SECRET_BYTES)).await.is_ok());
    }

    #[tokio::test]
    async fn test_hash_secret_rejects_empty() {
        let svc = service(config()).unwrap();
        assert!(matches!(
            svc.hash_secret("").await,
            Err(AuthError::InvalidRequest(_))
        ));
    }
}
