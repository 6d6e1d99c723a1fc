use std::time::Duration;

use reqwest::Client;

use super::message::OutboundMessage;
use crate::config::NotifyConfig;
use crate::{Error, Result};

/// Minimal REST client for the notification collaborator.
///
/// Delivery is best-effort: success or failure of one send is the only
/// observable outcome, and a failed send never rolls back the persistence
/// that preceded it.
pub struct Notifier {
    client: Client,
    api_base: String,
    token: String,
}

impl Notifier {
    /// Establish the notification session. Validates the token against the
    /// gateway; a failure here is a startup failure and aborts the process.
    pub async fn connect(config: &NotifyConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| Error::Config("notify.token is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        let notifier = Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        };

        let response = notifier
            .client
            .get(format!("{}/users/@me", notifier.api_base))
            .header("Authorization", notifier.auth_header())
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "session validation failed: HTTP {}",
                response.status()
            )));
        }

        tracing::info!("Notification session established");
        Ok(notifier)
    }

    /// Deliver one message to a destination channel
    pub async fn send(&self, channel_id: &str, message: &OutboundMessage) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(message)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notify(format!(
                "delivery to {} failed: HTTP {} {}",
                channel_id, status, body
            )));
        }

        Ok(())
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }
}
