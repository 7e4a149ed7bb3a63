// src/content/pdf.rs
use anyhow::{anyhow, Context, Result};

/// Extract plain text from a PDF held in memory.
///
/// The extractor is CPU bound and can panic on odd documents, so it runs on the
/// blocking pool; a panic comes back as an error for this entry only.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .context("pdf extraction task")?
        .map_err(|e| anyhow!("pdf text extraction failed: {e}"))?;
    Ok(super::normalize_text(&text))
}
