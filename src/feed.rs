// src/feed.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One validated feed item. Built only at the parsing boundary and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Free text; for bookmark feeds this is the bookmarker's comment. May be empty.
    pub description: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub title: Option<String>,
    /// Native feed order (usually newest first).
    pub entries: Vec<FeedEntry>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Feed>;
    fn describe(&self) -> String;
}

/// Parse RSS 0.9x/1.0 (RDF)/2.0, Atom or JSON Feed bytes.
///
/// Every entry must carry a link and a publication (or update) date; anything else
/// is rejected so a malformed feed aborts the run instead of silently losing items.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    let parsed = feed_rs::parser::parse(bytes).context("parsing feed document")?;

    let title = parsed.title.map(|t| t.content.trim().to_string());

    let mut entries = Vec::with_capacity(parsed.entries.len());
    for (idx, entry) in parsed.entries.into_iter().enumerate() {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "(no title)".to_string());

        let link = article_link(&entry.links)
            .ok_or_else(|| anyhow!("feed entry #{idx} ({title:?}) has no link"))?;

        let published_at = entry
            .published
            .or(entry.updated)
            .ok_or_else(|| anyhow!("feed entry #{idx} ({title:?}) has no parseable publication date"))?;

        let description = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        entries.push(FeedEntry {
            title,
            link,
            description,
            published_at,
        });
    }

    Ok(Feed { title, entries })
}

/// The entry's article URL: the first link without a `rel` or with
/// `rel="alternate"`. Atom entries may list `replies`/`self`/`edit` links first.
fn article_link(links: &[feed_rs::model::Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Fetches the configured feed over HTTP.
pub struct HttpFeedSource {
    url: String,
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Feed> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("feed http get {}", self.url))?
            .error_for_status()
            .context("feed non-2xx")?;
        let bytes = resp.bytes().await.context("feed http body")?;
        parse_feed(&bytes)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Serves a fixed document; handy for replaying a saved feed.
pub struct StaticFeedSource {
    body: Vec<u8>,
}

impl StaticFeedSource {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self) -> Result<Feed> {
        parse_feed(&self.body)
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}
