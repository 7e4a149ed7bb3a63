// src/summarize/openai.rs
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionProvider, ProviderError};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Chat Completions provider.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: &str, language: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            language: language.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Point at another Chat Completions compatible endpoint (proxies, local stubs).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You summarize technical articles for software engineers. \
             Reply in {} with exactly 3 bullet points, each starting with \"- \". \
             Focus on the technical substance; no preamble, no closing remarks.",
            self.language
        )
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Map a non-2xx response to a provider error. Oversized input shows up either as
/// HTTP 413 or as a 400 carrying one of the length error codes.
pub(crate) fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let env: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let code = env.error.code.as_deref().unwrap_or_default();
    let too_large = status == StatusCode::PAYLOAD_TOO_LARGE
        || (status == StatusCode::BAD_REQUEST
            && matches!(
                code,
                "context_length_exceeded" | "string_above_max_length" | "request_too_large"
            ));
    let msg = if env.error.message.is_empty() {
        format!("openai http {status}")
    } else {
        format!("openai http {status}: {}", env.error.message)
    };
    if too_large {
        ProviderError::TooLarge(msg)
    } else {
        ProviderError::Other(anyhow!(msg))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, title: &str, text: &str) -> Result<Completion, ProviderError> {
        let system = self.system_prompt();
        let user = format!("Title: {title}\n\n{text}");
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &system,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let body: Resp = resp.json().await.context("openai response json")?;
        Ok(Completion {
            choices: body
                .choices
                .into_iter()
                .map(|c| c.message.content.unwrap_or_default())
                .collect(),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
