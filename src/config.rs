/// Configuration module.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/tables.json")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_search_top_k() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_name_weight() -> usize {
    2
}

fn default_provider() -> ProviderKind {
    ProviderKind::Onnx
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_max_length() -> usize {
    256
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// JSON export of table descriptors.
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_true")]
    pub use_cache: bool,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ComposeConfig {
    /// How many times the table name is repeated in the embedded text.
    #[serde(default = "default_name_weight")]
    pub name_weight: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Sentence-transformer model run through ONNX Runtime.
    Onnx,
    /// Lexical feature hashing, no model files required.
    Hash,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_model_name")]
    pub name: String,

    /// HuggingFace repository the ONNX files are fetched from.
    #[serde(default = "default_model_repo")]
    pub repo: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            cache_dir: default_cache_dir(),
            use_cache: default_true(),
            search_top_k: default_search_top_k(),
            compose: ComposeConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            name_weight: default_name_weight(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model_name(),
            repo: default_model_repo(),
            dimensions: default_dimensions(),
            max_length: default_max_length(),
            model_dir: default_model_dir(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults; when the missing file is the
    /// default `config.json`, a template is written next to it.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();

        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            let cfg = Self::default();

            if path == Path::new(DEFAULT_CONFIG_PATH) {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {}", path.display()),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", path.display());
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.compose.name_weight > 0,
            "compose.name_weight must be positive"
        );
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(
            !self.model.name.trim().is_empty(),
            "model.name must not be empty"
        );
        if self.model.provider == ProviderKind::Onnx {
            anyhow::ensure!(
                !self.model.repo.trim().is_empty(),
                "model.repo is required for the onnx provider"
            );
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
