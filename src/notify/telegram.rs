use crate::detection::AnomalyEvent;
use crate::notify::{Notifier, NotifyError};
use crate::utils::config::TelegramConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Sends anomaly messages to a Telegram chat through the Bot API
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &AnomalyEvent) -> Result<(), NotifyError> {
        let text = event.to_string();
        debug!(msg = %text, "Sending message to Telegram");

        let response = self
            .client
            .post(self.send_message_url())
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();

        match response.json::<BotResponse>().await {
            Ok(body) if status.is_success() && body.ok => Ok(()),
            Ok(body) => Err(NotifyError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            )),
            Err(e) if status.is_success() => Err(e.into()),
            // Proxies answer with HTML error pages
            Err(_) => Err(NotifyError::Rejected(format!("HTTP {}", status))),
        }
    }
}
