use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::{article_body, Message, Notifier, WebhookResponse};

/// Discord caps embed titles at 256 and descriptions at 4096 chars.
const TITLE_MAX: usize = 256;
const DESCRIPTION_MAX: usize = 4096;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .context("building discord http client")?;
        Ok(Self {
            webhook,
            client,
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, msg: &Message) -> Result<WebhookResponse> {
        let payload = DiscordWebhookPayload::from_message(msg);
        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .context("discord post")?;
        let status = rsp.status();
        if !status.is_success() {
            tracing::warn!(%status, "discord webhook returned non-2xx");
        }
        Ok(WebhookResponse {
            status: status.as_u16(),
        })
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct DiscordImage {
    url: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct DiscordEmbed {
    title: String,
    url: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordImage>,
}

#[derive(Debug, Serialize, PartialEq)]
struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_message(msg: &Message) -> Self {
        match msg {
            Message::Reference { url } => Self {
                content: Some(format!("Reference: {url}")),
                embeds: Vec::new(),
            },
            Message::Article {
                title,
                link,
                image_url,
                comment,
                summary,
            } => Self {
                content: None,
                embeds: vec![DiscordEmbed {
                    title: clip(title, TITLE_MAX),
                    url: link.clone(),
                    description: clip(&article_body(comment, summary), DESCRIPTION_MAX),
                    image: image_url.clone().map(|url| DiscordImage { url }),
                }],
            },
        }
    }
}

fn clip(s: &str, max: usize) -> String {
    crate::summarize::truncate_chars(s, max).to_string()
}
