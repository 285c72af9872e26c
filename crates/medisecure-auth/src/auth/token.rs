//! Compact JWT encoding and signature verification.
//!
//! The codec checks structure, algorithm, signature and (when configured) the
//! issuer. Expiry is judged by the caller against its own clock so the
//! boundary is exact: a token is dead at `exp`, with no leeway.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use super::claims::Claims;
use super::config::SigningAlgorithm;
use super::error::{AuthError, AuthResult};

/// HMAC token codec holding the immutable signing secret.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec. The secret must already be validated.
    pub fn new(secret: &str, algorithm: SigningAlgorithm, issuer: Option<String>) -> Self {
        let mut validation = Validation::new(algorithm.to_jwt());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        if let Some(iss) = &issuer {
            validation.set_issuer(&[iss.as_str()]);
            validation.required_spec_claims.insert("iss".to_string());
        }

        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Sign a claim set into a compact token.
    pub fn encode(&self, claims: &Claims) -> AuthResult<String> {
        encode(
            &Header::new(self.algorithm.to_jwt()),
            claims,
            &self.encoding_key,
        )
        .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify the signature and parse the claims. Does not check expiry.
    ///
    /// Every structural, algorithm, issuer or signature problem collapses to
    /// [`AuthError::InvalidSignature`]; the cause is only logged.
    pub fn decode(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(kind = ?e.kind(), "token rejected");
                AuthError::InvalidSignature
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{Account, AccountRole};
    use chrono::{Duration, Utc};

    const SECRET: &str = "test-secret-for-unit-tests-minimum-32-chars-long";

    fn sample_claims() -> Claims {
        let now = Utc::now();
        let account = Account {
            id: "acc_1".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Admin".to_string(),
            role: AccountRole::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        Claims::for_account(&account, now, now + Duration::minutes(30), None)
    }

    #[test]
    fn test_encode_decode() {
        let codec = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);
        let claims = sample_claims();
        let token = codec.encode(&claims).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn test_decode_ignores_expiry() {
        let codec = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);
        let mut claims = sample_claims();
        claims.exp = 1;
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap().exp, 1);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);
        let other = TokenCodec::new(
            "another-secret-that-is-also-32-characters-long",
            SigningAlgorithm::HS256,
            None,
        );
        let token = other.encode(&sample_claims()).unwrap();
        assert!(matches!(codec.decode(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let hs256 = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);
        let hs512 = TokenCodec::new(SECRET, SigningAlgorithm::HS512, None);
        let token = hs512.encode(&sample_claims()).unwrap();

        assert!(hs512.decode(&token).is_ok());
        assert!(matches!(hs256.decode(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_issuer_enforced() {
        let with_iss = TokenCodec::new(
            SECRET,
            SigningAlgorithm::HS256,
            Some("medisecure-auth".to_string()),
        );
        let without_iss = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);

        let mut claims = sample_claims();
        claims.iss = Some("medisecure-auth".to_string());
        assert!(with_iss.decode(&with_iss.encode(&claims).unwrap()).is_ok());

        // Same secret, no issuer claim
        let token = without_iss.encode(&sample_claims()).unwrap();
        assert!(matches!(with_iss.decode(&token), Err(AuthError::InvalidSignature)));

        claims.iss = Some("someone-else".to_string());
        let token = with_iss.encode(&claims).unwrap();
        assert!(matches!(with_iss.decode(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);
        for token in ["", "abc", "a.b.c", "dev:admin", "....."] {
            assert!(
                matches!(codec.decode(token), Err(AuthError::InvalidSignature)),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_hides_keys() {
        let codec = TokenCodec::new(SECRET, SigningAlgorithm::HS256, None);
        let debug = format!("{codec:?}");
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("HS256"));
    }
}
