//! Configuration module for the semantic search service.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `RAGREPO_` and use double
//! underscores to separate nested levels:
//! - `RAGREPO_SEARCH__TOP_K=5` sets `search.top_k`
//! - `RAGREPO_SERVER__BIND=0.0.0.0:3000` sets `server.bind`
//! - `RAGREPO_CONTENT_ROOT=docs` sets `content_root`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SearchError, SearchResult};

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".ragrepo";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RAGREPO_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the documents to index and serve under `/content`
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Directory served under `/static`
    #[serde(default = "default_static_root")]
    pub static_root: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Corpus scanning and index build settings
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query settings
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// File extensions (without the dot) that mark a file as a document
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Number of threads used to embed documents during the build
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Number of documents sent to the embedder in one call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Honour .gitignore and .ragrepoignore files inside the corpus
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    /// Index files and directories whose name starts with a dot
    #[serde(default = "default_false")]
    pub include_hidden: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// L2-normalize every embedding before it is stored or compared
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Where downloaded model weights are cached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Number of documents returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Longest accepted query, in characters
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Drop results scoring below this value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Upper bound for the embed-and-rank work of one `/search` request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_content_root() -> PathBuf {
    PathBuf::from("content")
}
fn default_static_root() -> PathBuf {
    PathBuf::from("static")
}
fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_batch_size() -> usize {
    32
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_top_k() -> usize {
    10
}
fn default_max_query_chars() -> usize {
    2048
}
fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            content_root: default_content_root(),
            static_root: default_static_root(),
            debug: false,
            indexing: IndexingConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            parallel_threads: default_parallel_threads(),
            batch_size: default_batch_size(),
            respect_gitignore: true,
            include_hidden: false,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            normalize: true,
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_query_chars: default_max_query_chars(),
            min_score: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscores
            // stay part of the field name
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace config by looking for a .ragrepo directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> SearchResult<()> {
        if self.search.top_k == 0 {
            return Err(SearchError::Config {
                reason: "search.top_k must be at least 1".to_string(),
            });
        }
        if self.indexing.batch_size == 0 {
            return Err(SearchError::Config {
                reason: "indexing.batch_size must be at least 1".to_string(),
            });
        }
        if self.indexing.parallel_threads == 0 {
            return Err(SearchError::Config {
                reason: "indexing.parallel_threads must be at least 1".to_string(),
            });
        }
        if self
            .indexing
            .extensions
            .iter()
            .all(|ext| ext.trim_start_matches('.').is_empty())
        {
            return Err(SearchError::Config {
                reason: "indexing.extensions must name at least one file extension".to_string(),
            });
        }
        if let Some(min) = self.search.min_score {
            if !(-1.0..=1.0).contains(&min) {
                return Err(SearchError::Config {
                    reason: format!("search.min_score must be within [-1, 1], got {min}"),
                });
            }
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Parsed `server.bind`.
    pub fn bind_addr(&self) -> SearchResult<SocketAddr> {
        self.server.bind.parse().map_err(|e| SearchError::Config {
            reason: format!("server.bind '{}' is not a socket address: {e}", self.server.bind),
        })
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# ragrepo configuration file

# Version of the configuration schema
version = 1

# Documents to index, served under /content/<path>
content_root = "content"

# Static assets, served under /static/<path>
static_root = "static"

# Global debug mode
debug = false

[indexing]
# File extensions that count as documents
extensions = ["md"]

# Threads used to embed documents at startup (defaults to CPU count)
# parallel_threads = {}

# Documents per embedding call
batch_size = 32

# Skip files matched by .gitignore / .ragrepoignore
respect_gitignore = true

# Index dot-files and dot-directories
include_hidden = false

[embedding]
# Model to use for embeddings
model = "AllMiniLML6V2"

# L2-normalize embeddings
normalize = true

# Where model weights are cached
# cache_dir = ".ragrepo/models"

show_download_progress = true

[search]
# Results per query
top_k = 10

# Longest accepted query in characters
max_query_chars = 2048

# Drop results below this cosine similarity (-1.0 to 1.0)
# min_score = 0.2

[server]
# HTTP server bind address
bind = "127.0.0.1:8080"

# Timeout for one /search request in milliseconds
request_timeout_ms = 10000
"#,
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
