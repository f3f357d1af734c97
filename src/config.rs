use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::generator::normalize_extensions;

/// Status codes recorded when no explicit set is configured.
pub const DEFAULT_STATUS_CODES: &[u16] = &[200, 301, 302, 307, 308, 401, 403];

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "dirbuster-rs/0.1",
];

pub const DEFAULT_PROGRESS_FILE: &str = "dirbuster-progress.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target is empty")]
    EmptyTarget,

    #[error("invalid target URL {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("status code set is empty")]
    EmptyStatusCodes,

    #[error("progress save interval must be at least 1")]
    ZeroSaveInterval,
}

/// Everything a scan needs, with defaults matching the command line.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Host or URL; `http://` is assumed when no scheme is given.
    pub target: String,
    pub wordlist: PathBuf,
    /// Worker pool size (default 10).
    pub threads: usize,
    /// Pause after each request, per worker.
    pub delay: Duration,
    /// Per-request timeout (default 10s).
    pub timeout: Duration,
    pub output: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub status_codes: BTreeSet<u16>,
    /// Combination depth, 1..=3 (default 2).
    pub depth: usize,
    pub resume: bool,
    pub progress_file: PathBuf,
    /// Save progress after this many attempted paths (default 100).
    pub save_every: usize,
    pub templates_dir: Option<PathBuf>,
    pub user_agents: Vec<String>,
    /// Stop generating after this many candidates.
    pub max_paths: Option<usize>,
    pub verbose: bool,
    pub no_color: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            wordlist: PathBuf::from("wordlists/common.txt"),
            threads: 10,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(10),
            output: None,
            extensions: Vec::new(),
            status_codes: DEFAULT_STATUS_CODES.iter().copied().collect(),
            depth: 2,
            resume: false,
            progress_file: PathBuf::from(DEFAULT_PROGRESS_FILE),
            save_every: 100,
            templates_dir: None,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            max_paths: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl ScanConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Check and normalize the configuration once, before scanning.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let base = normalize_target(&self.target)?;
        self.target = base.to_string();
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.status_codes.is_empty() {
            return Err(ConfigError::EmptyStatusCodes);
        }
        if self.save_every == 0 {
            return Err(ConfigError::ZeroSaveInterval);
        }
        self.extensions = normalize_extensions(&self.extensions);
        self.user_agents.retain(|ua| !ua.trim().is_empty());
        if self.user_agents.is_empty() {
            self.user_agents = DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect();
        }
        Ok(self)
    }

    /// Parsed base URL. Only meaningful after [`validate`](Self::validate).
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        normalize_target(&self.target)
    }
}

/// Turn a host or URL into a base URL ending in `/`, so that joined paths
/// land beneath it.
pub fn normalize_target(target: &str) -> Result<Url, ConfigError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ConfigError::EmptyTarget);
    }
    let lower = target.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        target.to_string()
    } else {
        format!("http://{target}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| ConfigError::InvalidTarget {
        target: target.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidTarget {
            target: target.to_string(),
            reason: "missing host".into(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Parse a comma separated status code list such as `200,301,403`.
pub fn parse_status_codes(s: &str) -> Result<BTreeSet<u16>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u16>()
                .ok()
                .filter(|c| (100..=599).contains(c))
                .ok_or_else(|| format!("invalid status code: {p}"))
        })
        .collect()
}
