// src/config/job.rs
//
// Job settings from the environment (optionally seeded from `.env` by main).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::content::DEFAULT_READER_SERVICE_URL;
use crate::cursor::{CursorLocation, DEFAULT_BUCKET, DEFAULT_OBJECT_KEY};
use crate::notify::WebhookKind;
use crate::select::SelectionMode;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub feed_url: String,
    pub webhook_url: String,
    pub webhook_kind: WebhookKind,
    pub store_dir: PathBuf,
    pub cursor: CursorLocation,
    pub mode: SelectionMode,
    pub http_timeout: Duration,
    /// `None` when the reader service is switched off (empty env var).
    pub reader_service_url: Option<String>,
}

impl JobConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env` but reading from any key → value lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let feed_url = non_empty("RSS_FEED_URL").ok_or_else(|| anyhow!("RSS_FEED_URL is not set"))?;
        let webhook_url = non_empty("SLACK_WEBHOOK_URL")
            .or_else(|| non_empty("WEBHOOK_URL"))
            .ok_or_else(|| anyhow!("SLACK_WEBHOOK_URL (or WEBHOOK_URL) is not set"))?;

        let webhook_kind = match non_empty("WEBHOOK_KIND") {
            Some(v) => v.parse()?,
            None => WebhookKind::default(),
        };
        let mode = match non_empty("SELECTION_MODE") {
            Some(v) => v.parse()?,
            None => SelectionMode::default(),
        };
        let http_timeout = match non_empty("HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse::<u64>()
                    .with_context(|| format!("HTTP_TIMEOUT_SECS must be a number, got {v:?}"))?
                    .max(1),
            ),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        // Unset → default service; set but empty → disabled.
        let reader_service_url = match get("READER_SERVICE_URL") {
            None => Some(DEFAULT_READER_SERVICE_URL.to_string()),
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.trim().to_string()),
        };

        Ok(Self {
            feed_url,
            webhook_url,
            webhook_kind,
            store_dir: non_empty("CURSOR_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state")),
            cursor: CursorLocation {
                bucket: non_empty("CURSOR_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                key: non_empty("CURSOR_KEY").unwrap_or_else(|| DEFAULT_OBJECT_KEY.to_string()),
            },
            mode,
            http_timeout,
            reader_service_url,
        })
    }
}
