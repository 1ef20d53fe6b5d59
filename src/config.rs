use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::NashError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a shell assistant. Based on the following local file \
contents, Git context and conversation, translate the user's request into a valid single-line bash \
command. Respond only with the command, no explanations or formatting. Never return dangerous commands.";

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    // Indexing
    pub index_path: String,
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub exclusions: Vec<String>,
    pub extensions: Vec<String>,
    pub respect_gitignore: bool,
    pub structural_summary: bool,
    pub reindex_policy: String, // "append", "replace"
    pub watch_debounce_ms: u64,

    // Retrieval
    pub excerpt_bytes: usize,
    pub top_k: usize,
    pub distance_metric: String, // "squared_euclidean", "cosine"
    pub max_history: usize,
    pub history_turn_bytes: usize,
    pub system_prompt: String,

    // Git
    pub git_binary: String,
    pub git_status_bytes: usize,
    pub git_diff_file_bytes: usize,
    pub git_diff_max_files: usize,

    // Embeddings
    pub embedding_backend: String, // "fastembed", "hash"
    pub embedding_model: String,
    pub embedding_model_path: Option<String>,
    pub embedding_max_chars: usize,
    pub hash_dim: usize,

    // Logging
    pub log_level: String,
    pub log_format: String,
    pub log_to_file: bool,
    pub log_dir: String,
    pub trace_profile_enabled: bool,
}

impl AppConfig {
    /// Load default config (looks for nash.toml in current directory)
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path(None)
    }

    /// Load config from a specific file path. An explicit file replaces the
    /// user and working-directory files; `NASH__*` variables still apply on top.
    pub fn from_path(custom_path: Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        if let Some(path) = custom_path {
            let path_buf = PathBuf::from(&path);

            if !path_buf.exists() {
                return Err(ConfigError::Message(format!(
                    "Config file not found: {}",
                    path
                )));
            }

            if path_buf.extension().and_then(|s| s.to_str()) != Some("toml") {
                return Err(ConfigError::Message(format!(
                    "Config file must have .toml extension: {}",
                    path
                )));
            }

            builder = builder.add_source(File::from(path_buf));
        } else {
            // 1. ~/.config/nash/nash.toml
            if let Some(mut home) = dirs::config_dir() {
                home.push("nash");
                home.push("nash.toml");
                builder = builder.add_source(File::from(home).required(false));
            }

            // 2. ./nash.toml takes precedence over the user file
            if PathBuf::from("nash.toml").exists() {
                builder = builder.add_source(File::with_name("nash"));
            }
        }

        // 3. NASH__KEY=VALUE overrides everything
        builder = builder.add_source(Environment::with_prefix("NASH").separator("__"));

        let config = builder.build()?;

        config.try_deserialize().map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("unknown field") {
                ConfigError::Message(format!(
                    "Invalid configuration key found.\n{}\n\nPlease check your config file for typos.\nRun 'nash --help' to see valid options.",
                    err_msg
                ))
            } else {
                e
            }
        })
    }

    /// Built-in defaults only: no files, no environment.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::defaults()?.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("index_path", ".")?
            .set_default("max_files", 100)?
            .set_default("max_file_size_bytes", 1024 * 1024)?
            .set_default(
                "exclusions",
                vec!["venv", "__pycache__", ".git", "site-packages", "node_modules", "target"],
            )?
            .set_default("extensions", Vec::<String>::new())?
            .set_default("respect_gitignore", true)?
            .set_default("structural_summary", true)?
            .set_default("reindex_policy", "append")?
            .set_default("watch_debounce_ms", 500)?
            .set_default("excerpt_bytes", 500)?
            .set_default("top_k", 3)?
            .set_default("distance_metric", "squared_euclidean")?
            .set_default("max_history", 20)?
            .set_default("history_turn_bytes", 2000)?
            .set_default("system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("git_binary", "git")?
            .set_default("git_status_bytes", 4000)?
            .set_default("git_diff_file_bytes", 1000)?
            .set_default("git_diff_max_files", 20)?
            .set_default("embedding_backend", "fastembed")?
            .set_default("embedding_model", "all-minilm-l6-v2")?
            .set_default("embedding_max_chars", 8000)?
            .set_default("hash_dim", 384)?
            .set_default("log_level", "warn")?
            .set_default("log_format", "text")?
            .set_default("log_to_file", false)?
            .set_default("log_dir", "logs")?
            .set_default("trace_profile_enabled", false)
    }

    pub fn embedding_backend(&self) -> Result<EmbeddingBackend, NashError> {
        self.embedding_backend.parse()
    }

    pub fn distance_metric(&self) -> Result<DistanceMetric, NashError> {
        self.distance_metric.parse()
    }

    pub fn reindex_policy(&self) -> Result<ReindexPolicy, NashError> {
        self.reindex_policy.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    FastEmbed,
    Hash,
}

impl FromStr for EmbeddingBackend {
    type Err = NashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" => Ok(EmbeddingBackend::FastEmbed),
            "hash" => Ok(EmbeddingBackend::Hash),
            other => Err(NashError::config(format!(
                "unknown embedding_backend '{}' (expected \"fastembed\" or \"hash\")",
                other
            ))),
        }
    }
}

/// Distance used to rank neighbours. Swapping it changes ranking outcomes,
/// so the choice is part of the index identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    SquaredEuclidean,
    Cosine,
}

impl FromStr for DistanceMetric {
    type Err = NashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "squared_euclidean" | "l2" => Ok(DistanceMetric::SquaredEuclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            other => Err(NashError::config(format!(
                "unknown distance_metric '{}' (expected \"squared_euclidean\" or \"cosine\")",
                other
            ))),
        }
    }
}

/// What happens to earlier entries when a path is indexed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReindexPolicy {
    /// Every reindex appends a fresh document; older ones stay searchable.
    #[default]
    AppendOnly,
    /// Entries previously stored for the path are dropped in the same
    /// critical section that inserts the new one.
    ReplaceByPath,
}

impl FromStr for ReindexPolicy {
    type Err = NashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" | "append_only" => Ok(ReindexPolicy::AppendOnly),
            "replace" | "replace_by_path" => Ok(ReindexPolicy::ReplaceByPath),
            other => Err(NashError::config(format!(
                "unknown reindex_policy '{}' (expected \"append\" or \"replace\")",
                other
            ))),
        }
    }
}
