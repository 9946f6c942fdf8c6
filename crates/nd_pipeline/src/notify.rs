use std::fmt;

use async_trait::async_trait;
use nd_core::{Error, Notifier, RenderedNewsletter, Result};
use serde_json::{json, Value};
use tracing::info;

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const DEFAULT_FROM: &str = "newsletter@yourdomain.com";

/// Email delivery through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl fmt::Debug for ResendNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendNotifier")
            .field("from", &self.from)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ResendNotifier {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }

    /// `None` when `RESEND_API_KEY` is not set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let from = std::env::var("RESEND_FROM").unwrap_or_else(|_| DEFAULT_FROM.to_string());
        Some(Self::new(api_key, from))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, newsletter: &RenderedNewsletter, recipients: &[String]) -> Value {
        json!({
            "from": self.from,
            "to": recipients,
            "subject": newsletter.title,
            "html": newsletter.html,
            "text": newsletter.text,
        })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    fn name(&self) -> &str {
        "resend"
    }

    async fn deliver(&self, newsletter: &RenderedNewsletter, recipients: &[String]) -> Result<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(newsletter, recipients))
            .send()
            .await
            .map_err(|e| Error::Notify(format!("Resend request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notify(format!("Resend returned {}: {}", status, body)));
        }

        info!(recipients = recipients.len(), subject = %newsletter.title, "📧 Newsletter sent");
        Ok(())
    }
}
