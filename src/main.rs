use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use coolfix::config::AppConfig;
use coolfix::db;
use coolfix::handlers;
use coolfix::services::email::brevo::BrevoEmailProvider;
use coolfix::services::email::console::ConsoleEmailProvider;
use coolfix::services::email::EmailProvider;
use coolfix::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.action_token_secret == "changeme" || config.session_secret == "changeme" {
        tracing::warn!("ACTION_TOKEN_SECRET or SESSION_SECRET not set, using insecure defaults");
    }
    if config.admin_email.is_empty() {
        tracing::warn!("ADMIN_EMAIL not set, admin alerts will be skipped");
    }

    let conn = db::init_db(&config.database_url)?;

    let email: Box<dyn EmailProvider> = if config.brevo_api_key.is_empty() {
        tracing::info!("BREVO_API_KEY not set, logging emails to console");
        Box::new(ConsoleEmailProvider)
    } else {
        anyhow::ensure!(
            !config.email_sender_address.is_empty(),
            "EMAIL_SENDER_ADDRESS must be set when BREVO_API_KEY is set"
        );
        tracing::info!("using Brevo email provider (sender: {})", config.email_sender_address);
        Box::new(BrevoEmailProvider::new(
            config.brevo_api_key.clone(),
            config.email_sender_name.clone(),
            config.email_sender_address.clone(),
        ))
    };

    let state = Arc::new(AppState::new(conn, config.clone(), email)?);

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
