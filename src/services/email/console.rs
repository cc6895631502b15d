use async_trait::async_trait;

use super::{render, EmailProvider};
use crate::models::NotificationEvent;

/// Logs emails instead of sending them. Used when no Brevo key is configured.
pub struct ConsoleEmailProvider;

#[async_trait]
impl EmailProvider for ConsoleEmailProvider {
    async fn send(
        &self,
        to: &str,
        event: NotificationEvent,
        data: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let email = render(event, data);
        tracing::info!(
            to,
            event = %event,
            subject = %email.subject,
            "email (console transport)"
        );
        tracing::debug!(body = %email.html, "email body");
        Ok(())
    }
}
