//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` is optional and falls back to defaults:
//!
//! ```toml
//! [db]
//! path = "./data/docspan.sqlite"
//!
//! [chunking]
//! max_heading_depth = 3
//!
//! [retrieval]
//! final_limit = 12
//!
//! [upsert]
//! max_attempts = 3
//! retry_backoff_ms = 10
//!
//! [server]
//! bind = "127.0.0.1:7431"
//!
//! [ingest]
//! root = "./docs"
//! id_prefix = "docs.example.com"
//! include_globs = ["**/*.md", "**/*.mdx"]
//! exclude_globs = []
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docspan_core::context_store::UpsertOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub upsert: UpsertConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_heading_depth")]
    pub max_heading_depth: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_heading_depth: default_max_heading_depth(),
        }
    }
}

fn default_max_heading_depth() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
        }
    }
}

fn default_final_limit() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpsertConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base wait between conflicting commit attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_backoff_ms() -> u64 {
    10
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
    "127.0.0.1:7431".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_root")]
    pub root: PathBuf,
    /// Prepended to each file's relative path to form the context id.
    #[serde(default)]
    pub id_prefix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: default_ingest_root(),
            id_prefix: String::new(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_ingest_root() -> PathBuf {
    PathBuf::from("./docs")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.mdx".to_string()]
}

impl Config {
    /// Options for the upsert protocol derived from `[chunking]` and `[upsert]`.
    pub fn upsert_options(&self) -> UpsertOptions {
        UpsertOptions {
            max_heading_depth: self.chunking.max_heading_depth,
            max_attempts: self.upsert.max_attempts,
            retry_backoff: Duration::from_millis(self.upsert.retry_backoff_ms),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_heading_depth < 1 {
        bail!("chunking.max_heading_depth must be >= 1");
    }

    if config.retrieval.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }

    if config.upsert.max_attempts < 1 {
        bail!("upsert.max_attempts must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"./data/docspan.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.max_heading_depth, 3);
        assert_eq!(config.retrieval.final_limit, 12);
        assert_eq!(config.upsert.max_attempts, 3);
        assert_eq!(config.server.bind, "127.0.0.1:7431");
        assert_eq!(config.ingest.include_globs, vec!["**/*.md", "**/*.mdx"]);
        assert!(config.ingest.id_prefix.is_empty());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = parse_config("[db]\npath = \"x\"\n[chunking]\nmax_heading_depth = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_heading_depth"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(parse_config("[db]\npath = \"x\"\n[retrieval]\nfinal_limit = 0\n").is_err());
    }

    #[test]
    fn test_missing_db_section_rejected() {
        assert!(parse_config("[chunking]\nmax_heading_depth = 2\n").is_err());
    }

    #[test]
    fn test_upsert_options() {
        let config = parse_config(
            "[db]\npath = \"x\"\n[chunking]\nmax_heading_depth = 2\n[upsert]\nmax_attempts = 5\n",
        )
        .unwrap();
        let options = config.upsert_options();
        assert_eq!(options.max_heading_depth, 2);
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.retry_backoff, Duration::from_millis(10));

        let config = parse_config("[db]\npath = \"x\"\n[upsert]\nretry_backoff_ms = 0\n").unwrap();
        assert_eq!(config.upsert_options().retry_backoff, Duration::ZERO);
    }
}
