//! Count-based bigram language model
//!
//! Next-token logits are `ln(count(prev, next) + smoothing)`, optionally
//! shifted by a per-language bias. The model is loaded from `config.json`
//! and `bigram.json` in a model directory and is read-only afterwards.

use crate::model::{LanguageModel, CONFIG_FILE, WEIGHTS_FILE};
use crate::{CoreError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Model hyper-parameters from `config.json`
#[derive(Debug, Clone, Deserialize)]
pub struct BigramConfig {
    #[serde(default = "default_name")]
    pub name: String,

    pub vocab_size: usize,

    /// Zero or absent means the model declares no maximum
    #[serde(default)]
    pub max_position_embeddings: usize,

    #[serde(default)]
    pub use_lang_emb: bool,

    #[serde(default)]
    pub lang2id: HashMap<String, u32>,
}

fn default_name() -> String {
    "bigram".to_string()
}

/// Transition counts from `bigram.json`
#[derive(Debug, Clone, Deserialize)]
pub struct BigramWeights {
    /// Added to every count before taking the log; must be positive
    pub smoothing: f32,

    /// Counts for the first token of an empty prefix
    #[serde(default)]
    pub initial: HashMap<u32, f32>,

    /// `transitions[prev][next]` counts
    #[serde(default)]
    pub transitions: HashMap<u32, HashMap<u32, f32>>,

    /// Additive logit bias per language id
    #[serde(default)]
    pub language_bias: HashMap<u32, HashMap<u32, f32>>,
}

pub struct BigramModel {
    config: BigramConfig,
    weights: BigramWeights,
}

impl BigramModel {
    pub fn new(config: BigramConfig, weights: BigramWeights) -> Result<Self> {
        if config.vocab_size == 0 {
            return Err(CoreError::model(
                "MODEL_EMPTY_VOCAB",
                "Model vocabulary size must be positive",
                "Validating bigram model config",
                "Set `vocab_size` in config.json",
            ));
        }

        if !(weights.smoothing.is_finite() && weights.smoothing > 0.0) {
            return Err(CoreError::model(
                "MODEL_INVALID_SMOOTHING",
                format!("Smoothing must be a positive number, got {}", weights.smoothing),
                "Validating bigram weights",
                "Use a small positive value such as 0.01",
            ));
        }

        let out_of_range = weights
            .transitions
            .iter()
            .flat_map(|(&prev, row)| std::iter::once(prev).chain(row.keys().copied()))
            .chain(weights.initial.keys().copied())
            .find(|&id| id as usize >= config.vocab_size);
        if let Some(id) = out_of_range {
            return Err(CoreError::model(
                "MODEL_TOKEN_OUT_OF_RANGE",
                format!("Token id {} exceeds vocabulary size {}", id, config.vocab_size),
                "Validating bigram weights",
                "Check that bigram.json was built for this vocabulary",
            ));
        }

        Ok(Self { config, weights })
    }

    /// Load a model from a model directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config: BigramConfig = read_json(&dir.join(CONFIG_FILE))?;
        let weights: BigramWeights = read_json(&dir.join(WEIGHTS_FILE))?;
        let model = Self::new(config, weights)?;
        tracing::debug!(
            "Loaded bigram model '{}' ({} tokens, {} transition rows)",
            model.config.name,
            model.config.vocab_size,
            model.weights.transitions.len()
        );
        Ok(model)
    }

    pub fn config(&self) -> &BigramConfig {
        &self.config
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CoreError::model_with_path(
            "MODEL_FILE_OPEN_ERROR",
            format!("Failed to read model file: {}", e),
            "Loading model from model directory",
            "Check that the model directory contains config.json and bigram.json",
            path,
        )
    })?;

    serde_json::from_str(&content).map_err(|e| {
        CoreError::model_with_path(
            "MODEL_FILE_PARSE_ERROR",
            format!("Failed to parse model file: {}", e),
            "Loading model from model directory",
            "Check JSON format and field names",
            path,
        )
    })
}

impl LanguageModel for BigramModel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn max_position_embeddings(&self) -> Option<usize> {
        Some(self.config.max_position_embeddings).filter(|&n| n > 0)
    }

    fn languages(&self) -> Option<&HashMap<String, u32>> {
        if self.config.use_lang_emb && !self.config.lang2id.is_empty() {
            Some(&self.config.lang2id)
        } else {
            None
        }
    }

    fn forward(&self, input_ids: &[u32], language: Option<u32>) -> Result<Vec<f32>> {
        if let Some(limit) = self.max_position_embeddings() {
            if input_ids.len() > limit {
                return Err(CoreError::generation(
                    "GENERATION_CONTEXT_OVERFLOW",
                    format!("Prefix of {} tokens exceeds model capacity {}", input_ids.len(), limit),
                    "Bigram forward pass",
                    "Shorten the prompt or reduce the generation length",
                ));
            }
        }

        let counts = match input_ids.last() {
            Some(prev) => self.weights.transitions.get(prev),
            None => Some(&self.weights.initial),
        };

        let smoothing = self.weights.smoothing;
        let mut logits = vec![smoothing.ln(); self.config.vocab_size];
        if let Some(counts) = counts {
            for (&next, &count) in counts {
                logits[next as usize] = (count.max(0.0) + smoothing).ln();
            }
        }

        if let Some(bias) = language.and_then(|lang| self.weights.language_bias.get(&lang)) {
            for (&token, &shift) in bias {
                if let Some(logit) = logits.get_mut(token as usize) {
                    *logit += shift;
                }
            }
        }

        Ok(logits)
    }
}
