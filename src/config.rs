use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_CHECKPOINT_FILE: &str = "proposed_file_structure.json";
pub const DEFAULT_MAX_DEPTH: usize = 4;
pub const DEFAULT_TOKEN_BUDGET: usize = 24_000;
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// One request returning `{original_path: new_path}`
    #[default]
    SingleStage,
    /// Directory list first, then `{original_path: directory}` within that list
    TwoStage,
    /// One request per file against a fixed directory list
    PerFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorFormat {
    /// Pretty JSON array of descriptor objects
    Verbose,
    /// One `path | modified | sample` line per file
    #[default]
    Compact,
}

/// What happens to files the model never maps, even after the repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnmappedPolicy {
    #[default]
    FailFast,
    LeaveInPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProposalOptions {
    pub strategy: StrategyKind,
    pub format: DescriptorFormat,
    pub max_depth: usize,
    pub token_budget: usize,
    pub guidance: Option<String>,
    pub analyze_first: bool,
    /// Ask the model for a short summary of each text file before mapping.
    pub summarize: bool,
    /// Fixed destination vocabulary for the per-file strategy.
    pub directories: Vec<String>,
}

impl Default for ProposalOptions {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            format: DescriptorFormat::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            token_budget: DEFAULT_TOKEN_BUDGET,
            guidance: None,
            analyze_first: false,
            summarize: false,
            directories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// A local inference server replaces the hosted API base.
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.api_base = format!("http://localhost:{port}/v1");
        self
    }
}

#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    pub root: PathBuf,
    pub model: ModelConfig,
    pub proposal: ProposalOptions,
    pub retry: RetryPolicy,
    pub unmapped: UnmappedPolicy,
    pub checkpoint: Option<PathBuf>,
    pub from_checkpoint: Option<PathBuf>,
    pub max_scan_depth: Option<usize>,
    pub cleanup: bool,
    /// Sweep every empty directory under the root instead of only vacated ones.
    pub sweep_tree: bool,
    pub assume_yes: bool,
}

impl OrganizerConfig {
    pub fn new(root: impl Into<PathBuf>, model: ModelConfig) -> Self {
        Self {
            root: root.into(),
            model,
            proposal: ProposalOptions::default(),
            retry: RetryPolicy::default(),
            unmapped: UnmappedPolicy::default(),
            checkpoint: Some(PathBuf::from(DEFAULT_CHECKPOINT_FILE)),
            from_checkpoint: None,
            max_scan_depth: None,
            cleanup: true,
            sweep_tree: false,
            assume_yes: false,
        }
    }
}

/// Explicit key first, then the named environment variable, then the default one.
pub fn resolve_api_key(explicit: Option<String>, env_name: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Some(key);
    }

    let name = env_name.unwrap_or(DEFAULT_API_KEY_ENV);
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            warn!(
                env = name,
                "API key environment variable not found or empty; continuing without a key"
            );
            None
        }
    }
}

/// Splits a whitespace-separated directory list as given on the command line.
pub fn parse_directory_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(ToOwned::to_owned).collect()
}
