// src/lib.rs
// Library surface shared by the job binary and integration tests.

pub mod config;
pub mod content;
pub mod controller;
pub mod cursor;
pub mod feed;
pub mod notify;
pub mod select;
pub mod summarize;
pub mod telemetry;

use std::sync::Arc;

use tracing::info;

// ---- Re-exports for stable public API ----
pub use crate::controller::{Collaborators, InvocationResponse, RunController, RunResult, RunSettings};
pub use crate::feed::{Feed, FeedEntry};
pub use crate::notify::Message;
pub use crate::select::SelectionMode;

pub const USER_AGENT: &str = concat!("feed-summarizer/", env!("CARGO_PKG_VERSION"));

/// Wire production collaborators from configuration.
pub fn build_controller(
    job: &config::JobConfig,
    ai: &config::AiConfig,
    skip_domains: content::SkipDomains,
) -> anyhow::Result<RunController> {
    let provider = summarize::build_provider(ai)?;
    info!(
        feed = %job.feed_url,
        mode = %job.mode,
        webhook = %job.webhook_kind,
        provider = provider.name(),
        model = %ai.model,
        skip_domains = skip_domains.domains().len(),
        "job configured"
    );

    let deps = Collaborators {
        store: Arc::new(cursor::FileObjectStore::new(job.store_dir.clone())),
        feed: Arc::new(feed::HttpFeedSource::new(job.feed_url.clone(), job.http_timeout)?),
        resolver: Arc::new(content::HttpContentResolver::new(
            job.http_timeout,
            job.reader_service_url.clone(),
        )?),
        summarizer: summarize::Summarizer::new(provider, ai.into()),
        notifier: notify::build_notifier(job.webhook_kind, job.webhook_url.clone(), job.http_timeout)?,
    };
    let settings = RunSettings {
        mode: job.mode,
        cursor: job.cursor.clone(),
        skip_domains,
    };
    Ok(RunController::new(deps, settings))
}

/// Load everything from the environment / config files and run once.
pub async fn run_from_env() -> anyhow::Result<RunResult> {
    let job = config::JobConfig::from_env()?;
    let ai = config::AiConfig::load_default()?;
    let skip = content::skip::load_skip_domains_default()?;
    build_controller(&job, &ai, skip)?.run().await
}
