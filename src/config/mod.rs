
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunker::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Recognized book modules, in reading order. Only chapters inside these
    /// directories are ingested.
    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleDecl>,
    /// Root of the markdown corpus. Relative paths resolve against the
    /// current working directory.
    #[serde(default)]
    pub corpus_dir: Option<PathBuf>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service.
    pub endpoint: String,
    pub model: String,
    pub dimension: u32,
    /// Texts per batch embedding request.
    pub batch_size: u32,
    pub retry_attempts: u32,
    /// Pause between batch requests, for service rate limits.
    pub batch_delay_ms: u64,
    /// Optional path to a HuggingFace tokenizer.json used for token counting.
    /// Without it, token counts fall back to a length-based approximation.
    pub tokenizer_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleDecl {
    /// Directory name under the corpus root.
    pub id: String,
    /// Human-readable module title.
    pub title: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8085".to_string(),
            model: "text-embedding-004".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 50,
            retry_attempts: 3,
            batch_delay_ms: 1000,
            tokenizer_file: None,
        }
    }
}

fn default_modules() -> Vec<ModuleDecl> {
    [
        ("module-1-physical-ai", "Physical AI Foundations"),
        ("module-2-ros2", "ROS2 Middleware"),
        ("module-3-simulation", "Simulation & Digital Twins"),
        ("module-4-isaac", "NVIDIA Isaac Platform"),
    ]
    .into_iter()
    .map(|(id, title)| ModuleDecl {
        id: id.to_string(),
        title: title.to_string(),
    })
    .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid section token budget: {0} (must be between 100 and 4096)")]
    InvalidSectionTokens(usize),
    #[error("Overlap tokens ({0}) must be smaller than the section budget ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Duplicate module id: {0}")]
    DuplicateModule(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from `<base_dir>/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                embedding: EmbeddingConfig::default(),
                chunking: ChunkingConfig::default(),
                modules: default_modules(),
                corpus_dir: None,
                base_dir: base_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = base_dir.as_ref().to_path_buf();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;

        if !(100..=4096).contains(&self.chunking.max_section_tokens) {
            return Err(ConfigError::InvalidSectionTokens(
                self.chunking.max_section_tokens,
            ));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_section_tokens {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap_tokens,
                self.chunking.max_section_tokens,
            ));
        }

        for (i, module) in self.modules.iter().enumerate() {
            if self.modules[..i].iter().any(|m| m.id == module.id) {
                return Err(ConfigError::DuplicateModule(module.id.clone()));
            }
        }

        Ok(())
    }

    /// Root directory of the markdown corpus.
    pub fn corpus_dir(&self) -> PathBuf {
        self.corpus_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("docs"))
    }

    /// Directory holding the persisted vector index artifacts.
    pub fn index_dir(&self) -> PathBuf {
        self.base_dir.join("index")
    }

    /// Directory holding the derived summary/topic JSON documents.
    pub fn metadata_dir(&self) -> PathBuf {
        self.base_dir.join("metadata")
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.retry_attempts == 0 || self.retry_attempts > 10 {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))
    }
}
