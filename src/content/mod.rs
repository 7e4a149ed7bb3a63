// src/content/mod.rs
pub mod html;
pub mod pdf;
pub mod skip;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use reqwest::header::CONTENT_TYPE;

pub use skip::SkipDomains;

pub const DEFAULT_READER_SERVICE_URL: &str = "https://r.jina.ai/";

/// Text (and optional preview image) resolved for one article link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleContent {
    pub text: String,
    pub image_url: Option<String>,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentKind {
    #[default]
    Html,
    Pdf,
}

impl ContentKind {
    pub fn from_content_type(ct: Option<&str>) -> Self {
        match ct {
            Some(ct) if ct.trim().to_ascii_lowercase().starts_with("application/pdf") => Self::Pdf,
            _ => Self::Html,
        }
    }
}

#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ArticleContent>;
}

/// Normalize extracted text for the summarizer: decode entities, trim each line,
/// collapse runs of spaces and blank lines.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_SPACES: OnceCell<regex::Regex> = OnceCell::new();
    static RE_BLANKS: OnceCell<regex::Regex> = OnceCell::new();
    let re_spaces = RE_SPACES.get_or_init(|| {
        regex::Regex::new(r"[ \t\u{00A0}\u{3000}]+").expect("static regex")
    });
    let re_blanks = RE_BLANKS.get_or_init(|| regex::Regex::new(r"\n{3,}").expect("static regex"));

    let unified = decoded.replace("\r\n", "\n").replace('\r', "\n");
    let spaced = re_spaces.replace_all(&unified, " ");
    let lines: Vec<&str> = spaced.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    re_blanks.replace_all(&joined, "\n\n").trim().to_string()
}

/// Fetches article links over HTTP and routes them to the PDF or HTML path.
pub struct HttpContentResolver {
    client: reqwest::Client,
    reader_service_url: Option<String>,
}

impl HttpContentResolver {
    /// `reader_service_url`: prefix the article URL is appended to; `None` disables it.
    pub fn new(timeout: Duration, reader_service_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("building content http client")?;
        Ok(Self {
            client,
            reader_service_url: reader_service_url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Reader-friendly text for `url`, or `None` on timeout / error / non-2xx / empty body.
    async fn reader_text(&self, url: &str) -> Option<String> {
        let base = self.reader_service_url.as_deref()?;
        let endpoint = format!("{base}{url}");
        let resp = match self.client.get(&endpoint).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, timeout = e.is_timeout(), url, "reader service request failed, using local extraction");
                counter!("reader_fallbacks_total").increment(1);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), url, "reader service non-2xx, using local extraction");
            counter!("reader_fallbacks_total").increment(1);
            return None;
        }
        match resp.text().await {
            Ok(t) => {
                let t = normalize_text(&t);
                if t.is_empty() {
                    counter!("reader_fallbacks_total").increment(1);
                    None
                } else {
                    Some(t)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, url, "reader service body failed, using local extraction");
                counter!("reader_fallbacks_total").increment(1);
                None
            }
        }
    }
}

#[async_trait]
impl ContentResolver for HttpContentResolver {
    async fn resolve(&self, url: &str) -> Result<ArticleContent> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("article http get {url}"))?
            .error_for_status()
            .context("article non-2xx")?;

        let kind = ContentKind::from_content_type(
            resp.headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let final_url = resp.url().to_string();

        match kind {
            ContentKind::Pdf => {
                let bytes = resp.bytes().await.context("article pdf body")?;
                let text = pdf::extract_pdf_text(bytes.to_vec()).await?;
                Ok(ArticleContent {
                    text,
                    image_url: None,
                    kind,
                })
            }
            ContentKind::Html => {
                let body = resp.text().await.context("article html body")?;
                let page = html::extract_page(&body, &final_url);
                let text = match self.reader_text(url).await {
                    Some(t) => t,
                    None => page.text,
                };
                Ok(ArticleContent {
                    text,
                    image_url: page.image_url,
                    kind,
                })
            }
        }
    }
}
