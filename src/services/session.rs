//! Bearer session tokens. Sessions are minted by the account service at
//! login; this crate only needs to read them.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::signing::{self, TokenError};
use crate::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionKeys {
    secret: Vec<u8>,
}

impl SessionKeys {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(
        &self,
        account_id: &str,
        role: Role,
        ttl: Duration,
        now: NaiveDateTime,
    ) -> anyhow::Result<String> {
        let claims = SessionClaims {
            sub: account_id.to_string(),
            role,
            exp: (now + ttl).and_utc().timestamp(),
        };
        signing::sign(&self.secret, &claims)
    }

    pub fn verify(&self, token: &str, now: NaiveDateTime) -> Result<SessionClaims, TokenError> {
        let claims: SessionClaims = signing::verify(&self.secret, token)?;
        if now.and_utc().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
