//! Tokens embedded in the admin notification email. Each one authorizes a
//! single action on a single booking until it expires. Nothing is stored;
//! a token is valid iff its signature checks out and it has not expired.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::signing::{self, TokenError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionScope {
    #[serde(rename = "admin-confirm")]
    AdminConfirm,
    #[serde(rename = "admin-cancel")]
    AdminCancel,
}

impl ActionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionScope::AdminConfirm => "admin-confirm",
            ActionScope::AdminCancel => "admin-cancel",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionClaims {
    #[serde(rename = "bid")]
    pub booking_public_id: String,
    pub scope: ActionScope,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct ActionTokens {
    secret: Vec<u8>,
    ttl: Duration,
}

impl ActionTokens {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue(
        &self,
        booking_public_id: &str,
        scope: ActionScope,
        now: NaiveDateTime,
    ) -> anyhow::Result<String> {
        let issued_at = now.and_utc().timestamp();
        let claims = ActionClaims {
            booking_public_id: booking_public_id.to_string(),
            scope,
            issued_at,
            expires_at: issued_at + self.ttl.num_seconds(),
        };
        signing::sign(&self.secret, &claims)
    }

    pub fn verify(&self, token: &str, now: NaiveDateTime) -> Result<ActionClaims, TokenError> {
        let claims: ActionClaims = signing::verify(&self.secret, token)?;
        if now.and_utc().timestamp() >= claims.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Verifies the token and that it was issued for exactly this booking and
    /// this action. A valid token for another booking or scope is malformed
    /// here.
    pub fn verify_for(
        &self,
        token: &str,
        booking_public_id: &str,
        scope: ActionScope,
        now: NaiveDateTime,
    ) -> Result<ActionClaims, TokenError> {
        let claims = self.verify(token, now)?;
        if claims.booking_public_id != booking_public_id || claims.scope != scope {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }
}
