use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub action_token_secret: String,
    pub session_secret: String,
    pub action_token_ttl_hours: i64,
    pub public_base_url: String,
    pub admin_email: String,
    pub brevo_api_key: String,
    pub email_sender_name: String,
    pub email_sender_address: String,
    pub visit_charge: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "coolfix.db".to_string()),
            action_token_secret: env::var("ACTION_TOKEN_SECRET")
                .unwrap_or_else(|_| "changeme".to_string()),
            session_secret: env::var("SESSION_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            action_token_ttl_hours: env::var("ACTION_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(168),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string())
                .trim_end_matches('/')
                .to_string(),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_default(),
            brevo_api_key: env::var("BREVO_API_KEY").unwrap_or_default(),
            email_sender_name: env::var("EMAIL_SENDER_NAME")
                .unwrap_or_else(|_| "CoolFix Services".to_string()),
            email_sender_address: env::var("EMAIL_SENDER_ADDRESS").unwrap_or_default(),
            visit_charge: env::var("VISIT_CHARGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
        }
    }
}
