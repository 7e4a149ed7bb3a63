//! Feed summarizer job: binary entrypoint.
//! One invocation: poll the feed, notify new entries, persist the cursor, exit.
//! Meant to be driven by an external scheduler (cron, systemd timer, Lambda-style runner).

use std::process::ExitCode;

use feed_summarizer::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    match feed_summarizer::run_from_env().await {
        Ok(result) => {
            let response = result.to_invocation_response();
            match serde_json::to_string(&response) {
                Ok(s) => println!("{s}"),
                Err(e) => tracing::warn!(error = %e, "could not encode invocation response"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run failed, cursor not advanced");
            ExitCode::FAILURE
        }
    }
}
