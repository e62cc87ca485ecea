//! Language model trait and the bundled count-based implementation

pub mod bigram;

use crate::Result;
use std::collections::HashMap;

/// Core trait for causal language models driven by the generation pipeline
pub trait LanguageModel: Send + Sync {
    /// Get the model name
    fn name(&self) -> &str;

    /// Get vocabulary size
    fn vocab_size(&self) -> usize;

    /// Maximum supported sequence length, if the model declares one
    fn max_position_embeddings(&self) -> Option<usize>;

    /// Known languages when the model uses language embeddings
    fn languages(&self) -> Option<&HashMap<String, u32>> {
        None
    }

    /// Forward pass over the full prefix.
    /// Returns next-token logits for the last position only.
    fn forward(&self, input_ids: &[u32], language: Option<u32>) -> Result<Vec<f32>>;
}

/// Model capacity as the signed value the length resolver expects
pub fn capacity_of(model: &dyn LanguageModel) -> i64 {
    model
        .max_position_embeddings()
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Model file names inside a model directory
pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "bigram.json";
