use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::action_token::ActionTokens;
use crate::services::email::EmailProvider;
use crate::services::session::SessionKeys;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub email: Box<dyn EmailProvider>,
    pub action_tokens: ActionTokens,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(
        conn: Connection,
        config: AppConfig,
        email: Box<dyn EmailProvider>,
    ) -> anyhow::Result<Self> {
        let ttl = chrono::Duration::try_hours(config.action_token_ttl_hours)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .with_context(|| {
                format!(
                    "ACTION_TOKEN_TTL_HOURS out of range: {}",
                    config.action_token_ttl_hours
                )
            })?;
        let action_tokens = ActionTokens::new(config.action_token_secret.as_bytes(), ttl);
        let sessions = SessionKeys::new(config.session_secret.as_bytes());
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            email,
            action_tokens,
            sessions,
        })
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
    }
}
