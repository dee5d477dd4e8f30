use reqwest::Client;
use std::time::Duration;

use crate::config::Config;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram bot notifier. Missing credentials turn every send into a no-op.
pub struct TelegramNotifier {
    client: Client,
    token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        TelegramNotifier { client, token, chat_id }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.telegram_token.clone(), config.telegram_chat_id.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    /// Send a Markdown message. Returns whether it was delivered; errors are only logged.
    pub async fn send(&self, text: &str) -> bool {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            tracing::info!("Telegram credentials not set, skipping alert");
            return false;
        };

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, token);
        let form = [
            ("chat_id", chat_id.as_str()),
            ("text", text),
            ("parse_mode", "Markdown"),
        ];

        match self.client.post(&url).form(&form).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("✅ Telegram alert sent");
                true
            }
            Ok(resp) => {
                tracing::warn!("Telegram API Error: {}", resp.status());
                false
            }
            Err(e) => {
                tracing::warn!("Telegram send failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_notifier_skips() {
        let notifier = TelegramNotifier::new(Some("token".into()), None);
        assert!(!notifier.is_configured());
        assert!(!notifier.send("hello").await);
    }
}
