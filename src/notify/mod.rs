// src/notify/mod.rs
pub mod discord;
pub mod slack;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

/// What gets posted for one feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Bare link for hosts we can't fetch; the chat client unfurls it.
    Reference { url: String },
    /// Full card: title, link, preview image, bookmark comment, summary.
    Article {
        title: String,
        link: String,
        image_url: Option<String>,
        comment: String,
        summary: String,
    },
}

impl Message {
    pub fn link(&self) -> &str {
        match self {
            Message::Reference { url } => url,
            Message::Article { link, .. } => link,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Message::Reference { .. })
    }
}

/// Text shown in the body of an article card: the comment as a pull-quote, then the
/// summary as a fenced code block. Empty parts are left out.
pub fn article_body(comment: &str, summary: &str) -> String {
    let mut parts = Vec::with_capacity(2);
    let comment = comment.trim();
    if !comment.is_empty() {
        let quoted: Vec<String> = comment.lines().map(|l| format!("> {l}")).collect();
        parts.push(quoted.join("\n"));
    }
    let summary = summary.trim();
    if !summary.is_empty() {
        parts.push(format!("```\n{summary}\n```"));
    }
    parts.join("\n")
}

/// HTTP status returned by the webhook. Non-2xx is reported, not retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// One synchronous POST. Transport errors are returned as `Err`.
    async fn send(&self, msg: &Message) -> Result<WebhookResponse>;
    fn name(&self) -> &'static str;
}

pub type DynNotifier = Arc<dyn Notifier>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebhookKind {
    #[default]
    Slack,
    Discord,
}

impl FromStr for WebhookKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "discord" => Ok(Self::Discord),
            other => Err(anyhow!("unknown webhook kind {other:?} (expected slack|discord)")),
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slack => f.write_str("slack"),
            Self::Discord => f.write_str("discord"),
        }
    }
}

pub fn build_notifier(kind: WebhookKind, url: String, timeout: Duration) -> Result<DynNotifier> {
    Ok(match kind {
        WebhookKind::Slack => Arc::new(SlackNotifier::new(url)?.with_timeout(timeout)),
        WebhookKind::Discord => Arc::new(DiscordNotifier::new(url)?.with_timeout(timeout)),
    })
}
