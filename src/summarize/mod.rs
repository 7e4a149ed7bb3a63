//! Article summarization: provider abstraction + size-driven retry loop.
//!
//! The retry loop never blocks the notification: whatever happens, `summarize`
//! returns a `Summary`, possibly with empty text.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;

use crate::config::ai::AiConfig;

pub use openai::OpenAiProvider;

/// Errors a provider reports. Only `TooLarge` changes what the next attempt sends.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request too large: {0}")]
    TooLarge(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Raw model output: the text of each returned choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub choices: Vec<String>,
}

impl Completion {
    pub fn first_choice(&self) -> Option<&str> {
        self.choices.first().map(String::as_str)
    }
}

/// Low-level provider: does the remote call, no retry logic.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, title: &str, text: &str) -> Result<Completion, ProviderError>;
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn CompletionProvider>;

/// Outcome of one summarization, including how hard we had to try.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub attempts: u32,
    /// Characters of body text sent on the last attempt.
    pub input_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_input_chars: usize,
    pub truncate_chunk: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_input_chars: 12_000,
            truncate_chunk: 2_000,
        }
    }
}

impl From<&AiConfig> for RetryPolicy {
    fn from(cfg: &AiConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            max_input_chars: cfg.max_input_chars,
            truncate_chunk: cfg.truncate_chunk,
        }
    }
}

pub struct Summarizer {
    provider: DynProvider,
    policy: RetryPolicy,
}

impl Summarizer {
    pub fn new(provider: DynProvider, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Summarize `text`. On a "too large" rejection the tail is cut by
    /// `truncate_chunk` chars and the call is retried; other errors retry as-is.
    /// After `max_attempts` failures the summary is empty.
    pub async fn summarize(&self, title: &str, text: &str) -> Summary {
        let mut input = truncate_chars(text, self.policy.max_input_chars).to_string();

        for attempt in 1..=self.policy.max_attempts {
            counter!("summarizer_attempts_total").increment(1);
            let input_chars = input.chars().count();

            match self.provider.complete(title, &input).await {
                Ok(completion) => {
                    let text = completion.first_choice().unwrap_or_default().trim().to_string();
                    tracing::debug!(attempt, input_chars, summary_chars = text.chars().count(), "summary ready");
                    return Summary {
                        text,
                        attempts: attempt,
                        input_chars,
                    };
                }
                Err(ProviderError::TooLarge(msg)) => {
                    let keep = input_chars.saturating_sub(self.policy.truncate_chunk);
                    tracing::warn!(attempt, input_chars, keep, reason = %msg, "summarizer input too large, truncating");
                    input = truncate_chars(&input, keep).to_string();
                }
                Err(ProviderError::Other(e)) => {
                    tracing::warn!(attempt, error = %format!("{e:#}"), provider = self.provider.name(), "summarizer call failed");
                }
            }
        }

        tracing::warn!(
            attempts = self.policy.max_attempts,
            "summarizer gave up, continuing with an empty summary"
        );
        Summary {
            text: String::new(),
            attempts: self.policy.max_attempts,
            input_chars: input.chars().count(),
        }
    }
}

/// Longest prefix of at most `max` chars, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build the provider described by `cfg`.
///
/// * `AI_TEST_MODE=mock` → deterministic mock.
/// * disabled, unknown provider or no API key → `DisabledProvider`.
pub fn build_provider(cfg: &AiConfig) -> anyhow::Result<DynProvider> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockProvider::fixed(
            "- mock summary line 1\n- mock summary line 2\n- mock summary line 3",
        )));
    }

    if !cfg.enabled {
        tracing::info!("summaries disabled in AI config");
        return Ok(Arc::new(DisabledProvider));
    }

    match cfg.provider.as_str() {
        "openai" if cfg.api_key.is_empty() => {
            tracing::warn!("OPENAI_API_KEY not set, summaries disabled");
            Ok(Arc::new(DisabledProvider))
        }
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            cfg.api_key.clone(),
            &cfg.model,
            &cfg.language,
        )?)),
        other => {
            tracing::warn!(provider = other, "unsupported AI provider, summaries disabled");
            Ok(Arc::new(DisabledProvider))
        }
    }
}

/// Returns no choices; used when AI is disabled.
pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    async fn complete(&self, _title: &str, _text: &str) -> Result<Completion, ProviderError> {
        Ok(Completion::default())
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Simple mock provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: Completion,
}

impl MockProvider {
    pub fn fixed(text: &str) -> Self {
        Self {
            fixed: Completion {
                choices: vec![text.to_string()],
            },
        }
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, _title: &str, _text: &str) -> Result<Completion, ProviderError> {
        Ok(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
