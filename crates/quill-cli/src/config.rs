//! Configuration management for Quill CLI

use anyhow::{Context, Result};
use quill_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model directory used when `--model` is omitted
    pub default_model: Option<PathBuf>,

    /// Directories searched for model names
    pub model_dirs: Vec<PathBuf>,

    /// Defaults for generation flags left unset on the command line
    pub generation: GenerationConfig,
}

impl Config {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match config_path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !config_path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            return Ok(Self::with_default_dirs());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        if config.model_dirs.is_empty() {
            config.model_dirs = Self::default_model_dirs();
        }

        Ok(config)
    }

    fn with_default_dirs() -> Self {
        Self {
            model_dirs: Self::default_model_dirs(),
            ..Self::default()
        }
    }

    fn default_model_dirs() -> Vec<PathBuf> {
        vec![
            dirs::home_dir().unwrap_or_default().join(".quill/models"),
            PathBuf::from("./models"),
        ]
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
            .join("quill")
            .join("config.toml")
    }

    /// Resolve a model directory from a path or a name in the configured directories
    pub fn find_model(&self, model_name: &str) -> Result<PathBuf> {
        let model_path = Path::new(model_name);
        if model_path.is_dir() {
            return Ok(model_path.to_path_buf());
        }

        let expanded = shellexpand::full(model_name)
            .context("Failed to expand shell variables in model path")?;
        let expanded_path = Path::new(expanded.as_ref());
        if expanded_path.is_dir() {
            return Ok(expanded_path.to_path_buf());
        }

        for dir in &self.model_dirs {
            let candidate = dir.join(model_name);
            if candidate.is_dir() {
                return Ok(candidate);
            }
        }

        anyhow::bail!(
            "Model '{}' not found in any configured directory\n\
            Suggestion: Pass a model directory containing config.json, vocab.json and bigram.json",
            model_name
        );
    }

    /// Resolve `--model`, or the configured default model
    pub fn resolve_model(&self, model: Option<&str>) -> Result<PathBuf> {
        match model {
            Some(name) => self.find_model(name),
            None => match &self.default_model {
                Some(default_model) => self.find_model(&default_model.to_string_lossy()),
                None => anyhow::bail!(
                    "No model specified and no default model configured\n\
                    Suggestion: Use --model /path/to/model-dir or set default_model in the config file"
                ),
            },
        }
    }
}
