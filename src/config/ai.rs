// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_language() -> String {
    "Japanese".to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_max_input_chars() -> usize {
    12_000
}
fn default_truncate_chunk() -> usize {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only "openai" is wired; anything else disables summaries.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Language the bullet summary is written in.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Characters dropped from the end of the input after a "too large" rejection.
    #[serde(default = "default_truncate_chunk")]
    pub truncate_chunk: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            language: default_language(),
            max_attempts: default_max_attempts(),
            max_input_chars: default_max_input_chars(),
            truncate_chunk: default_truncate_chunk(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: AiConfig = serde_json::from_str(&data)?;
        Ok(cfg.normalized())
    }

    /// $AI_CONFIG_PATH, then config/ai.json; a missing default file means defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_AI_CONFIG_PATH) {
            return Self::load_from_file(&p)
                .map_err(|e| anyhow::anyhow!("loading AI config from {p}: {e}"));
        }
        let p = Path::new(DEFAULT_AI_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        Ok(Self::default().normalized())
    }

    fn normalized(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();

        // Resolve api key if "ENV"; a missing key is reported by the provider factory.
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                _ => String::new(),
            };
        }

        if self.max_attempts == 0 {
            self.max_attempts = default_max_attempts();
        }
        self.max_attempts = self.max_attempts.min(10);
        if self.max_input_chars == 0 {
            self.max_input_chars = default_max_input_chars();
        }
        if self.truncate_chunk == 0 {
            self.truncate_chunk = default_truncate_chunk();
        }
        if self.language.trim().is_empty() {
            self.language = default_language();
        }
        self
    }
}
