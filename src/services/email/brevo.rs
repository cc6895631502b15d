use anyhow::Context;
use async_trait::async_trait;

use super::{render, EmailProvider};
use crate::models::NotificationEvent;

const BREVO_URL: &str = "https://api.brevo.com/v3/smtp/email";

pub struct BrevoEmailProvider {
    api_key: String,
    sender_name: String,
    sender_address: String,
    client: reqwest::Client,
}

impl BrevoEmailProvider {
    pub fn new(api_key: String, sender_name: String, sender_address: String) -> Self {
        Self {
            api_key,
            sender_name,
            sender_address,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailProvider for BrevoEmailProvider {
    async fn send(
        &self,
        to: &str,
        event: NotificationEvent,
        data: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let email = render(event, data);
        let body = serde_json::json!({
            "sender": { "name": self.sender_name, "email": self.sender_address },
            "to": [{ "email": to }],
            "subject": email.subject,
            "htmlContent": email.html,
        });

        self.client
            .post(BREVO_URL)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to send Brevo email")?
            .error_for_status()
            .context("Brevo API returned error")?;

        Ok(())
    }
}
