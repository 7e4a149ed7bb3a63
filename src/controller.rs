//! Run controller: one invocation of the job, strictly sequential.
//!
//! read cursor → fetch feed → select → (resolve → summarize →) notify → write cursor
//!
//! Storage, feed and webhook transport errors abort the run before the cursor is
//! written. A content-resolution failure only drops that entry.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::content::{ContentResolver, SkipDomains};
use crate::cursor::{self, CursorLocation, ObjectStore};
use crate::feed::{FeedEntry, FeedSource};
use crate::notify::{DynNotifier, Message, WebhookResponse};
use crate::select::{Selection, SelectionMode};
use crate::summarize::{Summarizer, Summary};

/// External collaborators, constructed by the caller.
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub feed: Arc<dyn FeedSource>,
    pub resolver: Arc<dyn ContentResolver>,
    pub summarizer: Summarizer,
    pub notifier: DynNotifier,
}

#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub mode: SelectionMode,
    pub cursor: CursorLocation,
    pub skip_domains: SkipDomains,
}

/// What one invocation did. Observability only; nothing branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub mode: SelectionMode,
    pub selected: usize,
    pub notified: usize,
    pub reference_only: usize,
    pub failed: usize,
    pub non_2xx: usize,
    pub cursor_before: DateTime<Utc>,
    pub cursor_after: DateTime<Utc>,
}

impl RunResult {
    pub fn body(&self) -> String {
        if self.selected == 0 {
            return "No new entries.".to_string();
        }
        let mut s = format!("Processed {} entries.", self.notified);
        if self.failed > 0 {
            s.push_str(&format!(" {} failed.", self.failed));
        }
        s
    }

    pub fn to_invocation_response(&self) -> InvocationResponse {
        InvocationResponse {
            status_code: 200,
            body: self.body(),
        }
    }
}

/// `{ "statusCode": 200, "body": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: String,
}

enum EntryOutcome {
    Notified {
        reference: bool,
        response: WebhookResponse,
    },
    Failed,
}

pub struct RunController {
    deps: Collaborators,
    settings: RunSettings,
}

impl RunController {
    pub fn new(deps: Collaborators, settings: RunSettings) -> Self {
        Self { deps, settings }
    }

    pub async fn run(&self) -> Result<RunResult> {
        self.run_with_clock(Utc::now).await
    }

    /// Runs with a fixed clock: batch mode advances the cursor to `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunResult> {
        self.run_with_clock(move || now).await
    }

    /// `clock` is read once, after the last notification and before the
    /// cursor write, so anything published while the run was in flight is
    /// already behind the new cursor.
    pub async fn run_with_clock<C>(&self, clock: C) -> Result<RunResult>
    where
        C: Fn() -> DateTime<Utc> + Send + Sync,
    {
        crate::telemetry::describe_metrics();

        let cursor = cursor::read_cursor(self.deps.store.as_ref(), &self.settings.cursor).await?;
        let feed = self
            .deps
            .feed
            .fetch()
            .await
            .with_context(|| format!("fetching feed {}", self.deps.feed.describe()))?;

        let selection = Selection::plan(self.settings.mode, &feed.entries, cursor);
        info!(
            mode = %self.settings.mode,
            cursor = %cursor::format_timestamp(cursor),
            feed_entries = feed.entries.len(),
            selected = selection.entries.len(),
            "feed polled"
        );
        counter!("feed_entries_selected_total").increment(selection.entries.len() as u64);

        let mut result = RunResult {
            mode: self.settings.mode,
            selected: selection.entries.len(),
            notified: 0,
            reference_only: 0,
            failed: 0,
            non_2xx: 0,
            cursor_before: cursor,
            cursor_after: cursor,
        };

        for entry in &selection.entries {
            match self.process_entry(entry).await? {
                EntryOutcome::Notified {
                    reference,
                    response,
                } => {
                    result.notified += 1;
                    if reference {
                        result.reference_only += 1;
                    }
                    if !response.is_success() {
                        result.non_2xx += 1;
                    }
                }
                EntryOutcome::Failed => result.failed += 1,
            }
        }

        if let Some(next) = selection.next_cursor(clock()) {
            cursor::write_cursor(self.deps.store.as_ref(), &self.settings.cursor, next).await?;
            result.cursor_after = next;
        }

        info!(
            notified = result.notified,
            reference_only = result.reference_only,
            failed = result.failed,
            cursor = %cursor::format_timestamp(result.cursor_after),
            "run finished"
        );
        Ok(result)
    }

    async fn process_entry(&self, entry: &FeedEntry) -> Result<EntryOutcome> {
        let message = if self.settings.skip_domains.matches(&entry.link) {
            info!(link = %entry.link, "skip-domain link, sending reference only");
            Message::Reference {
                url: entry.link.clone(),
            }
        } else {
            let content = match self.deps.resolver.resolve(&entry.link).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(link = %entry.link, error = %format!("{e:#}"), "content resolution failed, entry dropped");
                    counter!("entry_failures_total").increment(1);
                    return Ok(EntryOutcome::Failed);
                }
            };

            let summary = if content.text.trim().is_empty() {
                Summary::default()
            } else {
                self.deps.summarizer.summarize(&entry.title, &content.text).await
            };
            if summary.text.is_empty() {
                warn!(link = %entry.link, attempts = summary.attempts, "no summary, notifying without one");
            }

            Message::Article {
                title: entry.title.clone(),
                link: entry.link.clone(),
                image_url: content.image_url,
                comment: entry.description.clone(),
                summary: summary.text,
            }
        };

        let resp = self
            .deps
            .notifier
            .send(&message)
            .await
            .with_context(|| format!("posting {} to {} webhook", entry.link, self.deps.notifier.name()))?;
        counter!("notifications_sent_total").increment(1);
        info!(link = %entry.link, status = resp.status, "notification sent");

        Ok(EntryOutcome::Notified {
            reference: message.is_reference(),
            response: resp,
        })
    }
}
