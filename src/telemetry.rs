// src/telemetry.rs
use metrics::describe_counter;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One-time metric descriptions. Without an installed recorder the macros are no-ops.
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_entries_selected_total",
            "Feed entries newer than the cursor picked for notification."
        );
        describe_counter!(
            "notifications_sent_total",
            "Webhook posts made (any status)."
        );
        describe_counter!(
            "summarizer_attempts_total",
            "Calls made to the summarization provider, retries included."
        );
        describe_counter!(
            "reader_fallbacks_total",
            "Reader service failures that fell back to local HTML extraction."
        );
        describe_counter!(
            "entry_failures_total",
            "Entries dropped because their content could not be resolved."
        );
    });
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines;
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_summarizer=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().compact().with_target(false)).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}
