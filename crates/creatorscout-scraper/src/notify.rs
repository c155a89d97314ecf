//! Telegram bot delivery for run status messages.

use std::time::Duration;

use async_trait::async_trait;
use creatorscout_core::Notifier;
use reqwest::{Client, Url};

use crate::error::ScraperError;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Sends each message to one chat through the bot API. Delivery problems
/// are logged and otherwise ignored.
pub struct TelegramNotifier {
    client: Client,
    endpoint: Url,
    chat_id: String,
}

impl TelegramNotifier {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(bot_token: &str, chat_id: &str, timeout_secs: u64) -> Result<Self, ScraperError> {
        Self::with_base_url(DEFAULT_API_URL, bot_token, chat_id, timeout_secs)
    }

    /// Notifier with a custom API origin (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    /// - [`ScraperError::Extraction`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        base_url: &str,
        bot_token: &str,
        chat_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let endpoint = format!(
            "{}/bot{bot_token}/sendMessage",
            base_url.trim_end_matches('/')
        );
        let endpoint = Url::parse(&endpoint).map_err(|e| ScraperError::Extraction {
            context: "telegram endpoint".to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            endpoint,
            chat_id: chat_id.to_owned(),
        })
    }

    async fn send(&self, message: &str) -> Result<(), ScraperError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("chat_id", &self.chat_id)
            .append_pair("text", message);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: "telegram sendMessage".to_owned(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("endpoint", &"[redacted]")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) {
        tracing::info!(target: "creatorscout::notify", "{message}");
        if let Err(e) = self.send(message).await {
            // reqwest errors carry the URL, which embeds the bot token.
            let error = match e {
                ScraperError::Http(inner) => inner.without_url().to_string(),
                other => other.to_string(),
            };
            tracing::warn!(error = %error, "telegram notification failed");
        }
    }
}
