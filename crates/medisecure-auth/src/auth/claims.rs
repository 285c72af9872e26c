//! JWT claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::{Account, AccountRole};

/// JWT claims structure.
///
/// Identity fields are copied from the [`Account`] at issuance and never
/// refreshed afterwards; a token reflects the account as it was when issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the account identifier, i.e. its email).
    pub sub: String,

    /// Account ID.
    pub user_id: String,

    /// Account email.
    pub email: String,

    /// Account role at issuance.
    pub role: AccountRole,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// Issued at (as Unix timestamp).
    pub iat: i64,

    /// JWT ID.
    pub jti: String,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Build the claim set for an account.
    pub fn for_account(
        account: &Account,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        issuer: Option<String>,
    ) -> Self {
        Self {
            sub: account.email.clone(),
            user_id: account.id.clone(),
            email: account.email.clone(),
            role: account.role,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            iss: issuer,
        }
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// True when the expiry is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    /// Check if the subject has the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }

    /// Get the display name for the subject.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}
