//! Revocation extension point.
//!
//! Tokens are stateless and stay valid until expiry. Deployments that need
//! early invalidation plug a [`RevocationCheck`] into
//! [`AuthService`](super::AuthService); it runs after signature and expiry
//! checks and should stay local (no network round trip on the request path).

use super::claims::Claims;

/// Decides whether an otherwise valid token has been revoked.
pub trait RevocationCheck: Send + Sync {
    fn is_revoked(&self, claims: &Claims) -> bool;
}

/// Default check: nothing is ever revoked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRevoked;

impl RevocationCheck for NeverRevoked {
    fn is_revoked(&self, _claims: &Claims) -> bool {
        false
    }
}

impl<F> RevocationCheck for F
where
    F: Fn(&Claims) -> bool + Send + Sync,
{
    fn is_revoked(&self, claims: &Claims) -> bool {
        self(claims)
    }
}
