// src/content/html.rs
//
// Local fallback extraction for HTML pages: main text + preview image.
// `scraper::Html` is not `Send`, so everything here is synchronous and returns owned data.

use scraper::{Html, Selector};
use url::Url;

/// What we keep from an HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub text: String,
    pub image_url: Option<String>,
}

/// Containers tried in order; the first one with text wins.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    ".post-content",
    ".entry-content",
    "#content",
    "body",
];

const IMAGE_META: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
    r#"meta[property="twitter:image"]"#,
];

pub fn extract_page(html: &str, page_url: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    ExtractedPage {
        text: main_text(&document),
        image_url: preview_image(&document, page_url),
    }
}

fn main_text(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let Some(element) = document.select(&selector).next() else {
            continue;
        };
        let rendered = match html2text::from_read(element.html().as_bytes(), 120) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error = %e, selector = selector_str, "html2text failed");
                continue;
            }
        };
        let text = super::normalize_text(&rendered);
        if !text.is_empty() {
            tracing::debug!(selector = selector_str, chars = text.chars().count(), "extracted page text");
            return text;
        }
    }
    String::new()
}

/// `og:image` / `twitter:image`, resolved against the page URL.
fn preview_image(document: &Html, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok();
    for sel in IMAGE_META {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        for el in document.select(&selector) {
            let Some(content) = el.value().attr("content").map(str::trim) else {
                continue;
            };
            if content.is_empty() {
                continue;
            }
            let resolved = match &base {
                Some(b) => b.join(content).ok().map(|u| u.to_string()),
                None => Url::parse(content).ok().map(|u| u.to_string()),
            };
            if let Some(u) = resolved.filter(|u| u.starts_with("http")) {
                return Some(u);
            }
        }
    }
    None
}
