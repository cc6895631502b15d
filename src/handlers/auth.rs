use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::services::bookings::now;
use crate::services::lifecycle::Actor;
use crate::services::session::SessionClaims;
use crate::state::AppState;

/// Reads and verifies the bearer session token.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<SessionClaims, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("").trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    state.sessions.verify(token, now()).map_err(|e| {
        tracing::debug!(error = %e, "session token rejected");
        AppError::Unauthorized
    })
}

pub fn actor(claims: &SessionClaims) -> Actor {
    Actor::Account {
        id: claims.sub.clone(),
        role: claims.role,
    }
}
