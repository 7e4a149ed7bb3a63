use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

use super::{article_body, Message, Notifier, WebhookResponse};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .context("building slack http client")?;
        Ok(Self {
            webhook_url: url,
            client,
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Slack incoming-webhook body for `msg`.
pub fn payload(msg: &Message) -> Value {
    match msg {
        Message::Reference { url } => json!({ "text": format!("Reference: {url}") }),
        Message::Article {
            title,
            link,
            image_url,
            comment,
            summary,
        } => {
            let mut attachment = json!({
                "fallback": title,
                "title": title,
                "title_link": link,
                "text": article_body(comment, summary),
                "mrkdwn_in": ["text"],
            });
            if let Some(img) = image_url {
                attachment["image_url"] = Value::String(img.clone());
            }
            json!({ "attachments": [attachment] })
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, msg: &Message) -> Result<WebhookResponse> {
        let body = payload(msg);
        let rsp = self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?;
        let status = rsp.status();
        if !status.is_success() {
            let text = rsp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "slack webhook returned non-2xx");
        }
        Ok(WebhookResponse {
            status: status.as_u16(),
        })
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
