// src/content/skip.rs
use anyhow::{ensure, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "SKIP_DOMAINS_PATH";
const CONFIG_FILES: &[&str] = &["config/skip_domains.toml", "config/skip_domains.json"];

/// Hosts whose pages can't be fetched or previewed from here (login walls etc.).
pub const DEFAULT_SKIP_DOMAINS: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "threads.net",
];

/// Deny-list of link hosts that only get a bare "reference" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDomains {
    domains: Vec<String>,
}

impl Default for SkipDomains {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_DOMAINS.iter().map(|d| d.to_string()))
    }
}

impl SkipDomains {
    pub fn new<I: IntoIterator<Item = String>>(domains: I) -> Self {
        let set: BTreeSet<String> = domains
            .into_iter()
            .filter_map(|d| normalize_domain(&d))
            .collect();
        Self {
            domains: set.into_iter().collect(),
        }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// True when the link's host is a listed domain or one of its subdomains.
    /// Links that don't parse as absolute URLs never match.
    pub fn matches(&self, link: &str) -> bool {
        let Ok(url) = url::Url::parse(link) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains.iter().any(|d| {
            host == *d
                || host
                    .strip_suffix(d.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }
}

/// `" *.X.com. "` → `x.com`; blank entries are dropped.
fn normalize_domain(raw: &str) -> Option<String> {
    let d = raw.trim().trim_start_matches("*.").trim_end_matches('.');
    (!d.is_empty()).then(|| d.to_ascii_lowercase())
}

/// Accepted file shapes: `domains = [...]` in TOML, `{"domains": [...]}` or a
/// bare `[...]` in JSON.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum SkipListFile {
    Table { domains: Vec<String> },
    Array(Vec<String>),
}

impl SkipListFile {
    fn parse(content: &str, path: &Path) -> Result<Self> {
        let is_toml = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            return toml::from_str(content).context("skip domains: invalid toml");
        }
        serde_json::from_str(content)
            .or_else(|_| toml::from_str(content))
            .context("skip domains: expected a JSON array or `domains = [...]`")
    }
}

impl From<SkipListFile> for SkipDomains {
    fn from(file: SkipListFile) -> Self {
        match file {
            SkipListFile::Table { domains } | SkipListFile::Array(domains) => Self::new(domains),
        }
    }
}

pub fn load_skip_domains_from(path: &Path) -> Result<SkipDomains> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading skip domains from {}", path.display()))?;
    SkipListFile::parse(&content, path).map(SkipDomains::from)
}

/// `$SKIP_DOMAINS_PATH` (must exist), else the first config file present,
/// else the built-in list.
pub fn load_skip_domains_default() -> Result<SkipDomains> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let path = PathBuf::from(&p);
        ensure!(path.exists(), "{ENV_PATH}={p} does not exist");
        return load_skip_domains_from(&path);
    }
    match CONFIG_FILES.iter().map(Path::new).find(|p| p.exists()) {
        Some(path) => load_skip_domains_from(path),
        None => Ok(SkipDomains::default()),
    }
}
