//! Run configuration for `ado-digest`.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Command-line flags
//! 2. Environment variables (`ADO_URL`, `WORK_ITEM_IDS`, ...; read by clap)
//! 3. The TOML file given with `--config`
//! 4. Built-in defaults
//!
//! ## TOML layout
//!
//! ```toml
//! ado_url = "https://dev.azure.com/contoso"
//! project = "Identity"
//! work_item_ids = [101, 102]
//! ollama_host = "http://localhost:11434"
//! model = "phi3.5:3.8b-mini-instruct-q4_K_M"
//!
//! [pipeline.context]
//! field_limit = 8000
//!
//! [pipeline.retry]
//! max_attempts = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pipeline::PipelineConfig;

use crate::cli::Args;

const DEFAULT_ADO_URL: &str = "https://dev.azure.com/your_org";
const DEFAULT_PROJECT: &str = "your_project";
const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "phi3.5:3.8b-mini-instruct-q4_K_M";
const DEFAULT_OUTPUT: &str = "work_item_summaries.md";
/// Used when no usable id was configured.
const FALLBACK_WORK_ITEM_ID: u64 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Values a `--config` file may provide. Everything is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub ado_url: Option<String>,
    pub project: Option<String>,
    pub pat: Option<String>,
    pub work_item_ids: Option<Vec<u64>>,
    pub ollama_host: Option<String>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
    pub skip_model_check: Option<bool>,
    pub pipeline: PipelineConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub ado_url: String,
    pub project: String,
    pub pat: Option<String>,
    pub work_item_ids: Vec<u64>,
    pub ollama_host: String,
    pub model: String,
    pub output: PathBuf,
    pub skip_model_check: bool,
    pub pipeline: PipelineConfig,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            ado_url: DEFAULT_ADO_URL.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            pat: None,
            work_item_ids: vec![FALLBACK_WORK_ITEM_ID],
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            skip_model_check: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DigestConfig {
    /// Resolve flags and environment (already merged by clap) over the
    /// optional config file over defaults.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let config = Self::merge(args, file);
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    fn merge(args: &Args, file: FileConfig) -> Self {
        let defaults = Self::default();

        let work_item_ids = match (&args.ids, file.work_item_ids) {
            (Some(raw), _) => parse_ids(raw),
            (None, Some(ids)) if !ids.is_empty() => ids,
            _ => defaults.work_item_ids,
        };

        let mut pipeline = file.pipeline;
        if let Some(limit) = args.field_limit {
            pipeline.context.field_limit = limit;
        }

        Self {
            ado_url: args.ado_url.clone().or(file.ado_url).unwrap_or(defaults.ado_url),
            project: args.project.clone().or(file.project).unwrap_or(defaults.project),
            pat: args.pat.clone().or(file.pat).filter(|p| !p.trim().is_empty()),
            work_item_ids,
            ollama_host: args
                .ollama_host
                .clone()
                .or(file.ollama_host)
                .unwrap_or(defaults.ollama_host),
            model: args.model.clone().or(file.model).unwrap_or(defaults.model),
            output: args.output.clone().or(file.output).unwrap_or(defaults.output),
            skip_model_check: args.skip_model_check || file.skip_model_check.unwrap_or(false),
            pipeline,
        }
    }

    /// Validate the configuration; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("ado_url", &self.ado_url),
            ("ollama_host", &self.ollama_host),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(format!("{name} must be an http(s) URL, got {value:?}"));
            }
        }
        if self.project.trim().is_empty() {
            return Err("project must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.work_item_ids.is_empty() {
            return Err("no work item ids configured".to_string());
        }
        self.pipeline.validate()
    }
}

/// Parse a comma-separated id list, ignoring entries that are not plain
/// digits. Falls back to a single default id when nothing usable remains.
pub fn parse_ids(raw: &str) -> Vec<u64> {
    let ids: Vec<u64> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect();
    if ids.is_empty() {
        vec![FALLBACK_WORK_ITEM_ID]
    } else {
        ids
    }
}
