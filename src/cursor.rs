//! Cursor persistence: the single "last run time" document kept in an object store.
//!
//! The store is a narrow trait so the controller can run against a directory on disk
//! in production and an in-memory map in tests.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BUCKET: &str = "feedsummarizer";
pub const DEFAULT_OBJECT_KEY: &str = "last_run_time.json";

/// Errors reported by an [`ObjectStore`]. Callers branch on `NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("object store i/o error")]
    Io(#[from] io::Error),
    #[error("object store error: {0}")]
    Other(String),
}

/// Minimal blob store: get/put of whole objects addressed by bucket + key.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
}

/// Where the cursor document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorLocation {
    pub bucket: String,
    pub key: String,
}

impl Default for CursorLocation {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            key: DEFAULT_OBJECT_KEY.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorDoc {
    last_run_time: String,
}

/// Read the cursor. A missing document means "beginning of time".
pub async fn read_cursor(store: &dyn ObjectStore, loc: &CursorLocation) -> Result<DateTime<Utc>> {
    let body = match store.get_object(&loc.bucket, &loc.key).await {
        Ok(b) => b,
        Err(StoreError::NotFound { .. }) => {
            tracing::info!(bucket = %loc.bucket, key = %loc.key, "no cursor stored yet, starting from the beginning");
            return Ok(DateTime::<Utc>::MIN_UTC);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading cursor {}/{}", loc.bucket, loc.key))
        }
    };

    let doc: CursorDoc = serde_json::from_slice(&body).context("decoding cursor document")?;
    parse_timestamp(&doc.last_run_time)
        .with_context(|| format!("parsing last_run_time {:?}", doc.last_run_time))
}

/// Overwrite the cursor document (last writer wins).
pub async fn write_cursor(
    store: &dyn ObjectStore,
    loc: &CursorLocation,
    ts: DateTime<Utc>,
) -> Result<()> {
    let doc = CursorDoc {
        last_run_time: format_timestamp(ts),
    };
    let body = serde_json::to_vec(&doc).context("encoding cursor document")?;
    store
        .put_object(&loc.bucket, &loc.key, body)
        .await
        .with_context(|| format!("writing cursor {}/{}", loc.bucket, loc.key))?;
    tracing::debug!(cursor = %doc.last_run_time, "cursor persisted");
    Ok(())
}

/// RFC 3339 with a `+00:00` offset and as many fractional digits as needed.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Accepts RFC 3339 with any offset, or a naive timestamp taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .with_context(|| format!("not an ISO-8601 timestamp: {s}"))?;
    Ok(naive.and_utc())
}

// ------------------------------------------------------------
// Stores
// ------------------------------------------------------------

/// Object store laid out on disk as `<root>/<bucket>/<key>`.
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait::async_trait]
impl ObjectStore for FileObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key);
        match tokio::fs::read(&path).await {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // tmp + rename so a crash never leaves a half-written cursor
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_raw(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let g = self
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        g.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    pub fn put_raw(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let mut g = self
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        g.insert((bucket.to_string(), key.to_string()), body.into());
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.get_raw(bucket, key).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.put_raw(bucket, key, body);
        Ok(())
    }
}
