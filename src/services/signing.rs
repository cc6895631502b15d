//! Compact signed tokens: `base64url(json claims) . base64url(hmac-sha256)`.
//!
//! The codec only proves integrity. Expiry and binding checks belong to the
//! callers in [`crate::services::action_token`] and [`crate::services::session`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is malformed or has an invalid signature")]
    Malformed,
}

fn mac(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Malformed)
}

pub fn sign<T: Serialize>(secret: &[u8], claims: &T) -> anyhow::Result<String> {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let mut mac = mac(secret)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

pub fn verify<T: DeserializeOwned>(secret: &[u8], token: &str) -> Result<T, TokenError> {
    let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed)?;

    let mut mac = mac(secret)?;
    mac.update(payload.as_bytes());
    // constant-time comparison
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::Malformed)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)
}
