//! Entry selection and cursor advancement.
//!
//! Two policies exist and they advance the cursor differently:
//! - `Batch`: every entry newer than the cursor, in feed order; cursor moves to "now".
//! - `Single`: only the oldest entry newer than the cursor; cursor moves to that
//!   entry's timestamp, so a backlog drains one entry per invocation.
//!
//! Comparison is strictly greater-than in both modes: an entry stamped exactly at the
//! cursor is never picked again.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::FeedEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Batch,
    Single,
}

impl FromStr for SelectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" | "all" => Ok(Self::Batch),
            "single" | "one" | "oldest" => Ok(Self::Single),
            other => Err(anyhow!("unknown selection mode {other:?} (expected batch|single)")),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => f.write_str("batch"),
            Self::Single => f.write_str("single"),
        }
    }
}

/// Entries strictly newer than `cursor`, feed order preserved.
pub fn select_new(entries: &[FeedEntry], cursor: DateTime<Utc>) -> Vec<&FeedEntry> {
    entries.iter().filter(|e| e.published_at > cursor).collect()
}

/// Oldest entry strictly newer than `cursor`, assuming the feed lists newest first.
pub fn select_oldest_new(entries: &[FeedEntry], cursor: DateTime<Utc>) -> Option<&FeedEntry> {
    entries.iter().rev().find(|e| e.published_at > cursor)
}

/// Outcome of applying a policy to one feed snapshot.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub mode: SelectionMode,
    pub cursor: DateTime<Utc>,
    pub entries: Vec<&'a FeedEntry>,
}

impl<'a> Selection<'a> {
    pub fn plan(mode: SelectionMode, entries: &'a [FeedEntry], cursor: DateTime<Utc>) -> Self {
        let entries = match mode {
            SelectionMode::Batch => select_new(entries, cursor),
            SelectionMode::Single => select_oldest_new(entries, cursor).into_iter().collect(),
        };
        Self {
            mode,
            cursor,
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor to persist after the selected entries were handled, or `None` to leave
    /// the stored cursor untouched. Never goes backwards.
    pub fn next_cursor(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.mode {
            SelectionMode::Batch => now,
            SelectionMode::Single => self.entries[0].published_at,
        };
        Some(next.max(self.cursor))
    }
}
