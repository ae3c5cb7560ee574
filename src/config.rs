//! TOML configuration parsing and validation.
//!
//! All settings live in one file (default `./config/counsel.toml`). Only
//! `[db]` is required; every other table falls back to the defaults
//! below.
//!
//! ```toml
//! [db]
//! path = "./data/counsel.sqlite"
//!
//! [chunking]
//! max_chars = 1000
//!
//! [retrieval]
//! top_n = 5
//! term_frequency_threshold = 2
//!
//! [scoring]
//! preferred_community = 10.0
//!
//! [vocabulary]
//! preferred_communities = ["vancouverlandlords", "landlordbc"]
//!
//! [completion]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o-mini"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use tenancy_counsel_core::chunk::DEFAULT_MAX_CHARS;
use tenancy_counsel_core::retrieve::{RetrievalParams, DEFAULT_TOP_N};
use tenancy_counsel_core::scoring::ScoringWeights;
use tenancy_counsel_core::terms::DEFAULT_FREQUENCY_THRESHOLD;
use tenancy_counsel_core::vocabulary::Vocabulary;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub vocabulary: Vocabulary,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_frequency_threshold")]
    pub term_frequency_threshold: usize,
    #[serde(default = "default_true")]
    pub include_citation_content: bool,
    #[serde(default = "default_true")]
    pub include_builtin_legislation: bool,
    /// Memoize the important-term set per corpus.
    #[serde(default = "default_true")]
    pub cache_terms: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            term_frequency_threshold: default_frequency_threshold(),
            include_citation_content: true,
            include_builtin_legislation: true,
            cache_terms: true,
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_n: self.top_n,
            frequency_threshold: self.term_frequency_threshold,
            include_citation_content: self.include_citation_content,
            include_builtin_legislation: self.include_builtin_legislation,
        }
    }
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_frequency_threshold() -> usize {
    DEFAULT_FREQUENCY_THRESHOLD
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Deadline for a whole response, or for each read of a stream.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    // Validate retrieval
    if config.retrieval.top_n < 1 {
        anyhow::bail!("retrieval.top_n must be >= 1");
    }
    if config.retrieval.term_frequency_threshold < 1 {
        anyhow::bail!("retrieval.term_frequency_threshold must be >= 1");
    }

    // Validate scoring
    for (name, value) in config.scoring.fields() {
        if !value.is_finite() || value < 0.0 {
            anyhow::bail!("scoring.{} must be a non-negative number", name);
        }
    }

    // Validate completion
    if config.completion.endpoint.trim().is_empty() {
        anyhow::bail!("completion.endpoint must not be empty");
    }
    if config.completion.timeout_secs == 0 {
        anyhow::bail!("completion.timeout_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"/tmp/counsel.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.retrieval.top_n, 5);
        assert_eq!(config.retrieval.term_frequency_threshold, 2);
        assert_eq!(config.scoring, ScoringWeights::default());
        assert_eq!(config.vocabulary, Vocabulary::default());
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_overrides() {
        let config = parse_config(
            r#"
[db]
path = "x.sqlite"

[retrieval]
top_n = 3
term_frequency_threshold = 3

[scoring]
preferred_community = 20.0

[vocabulary]
related_pairs = [["mould", "repair"]]
"#,
        )
        .unwrap();
        assert_eq!(config.retrieval.params().top_n, 3);
        assert_eq!(config.retrieval.params().frequency_threshold, 3);
        assert_eq!(config.scoring.preferred_community, 20.0);
        assert_eq!(config.scoring.phrase_match, 8.0);
        assert_eq!(
            config.vocabulary.related_pairs,
            vec![("mould".to_string(), "repair".to_string())]
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse_config("[db]\npath = \"x\"\n[chunking]\nmax_chars = 0\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[retrieval]\ntop_n = 0\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[scoring]\nrelated_pair = -1.0\n").is_err());
        assert!(parse_config("[chunking]\nmax_chars = 10\n").is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/counsel.example.toml")).unwrap();
        assert_eq!(config.scoring, ScoringWeights::default());
        assert!(config.vocabulary.is_preferred_community("LandlordBC"));
    }
}
