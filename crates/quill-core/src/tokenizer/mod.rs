//! Codec module for text tokenization
//!
//! The generation layer only ever talks to a [`Codec`]: anything able to map
//! text to token ids and back can drive it. [`vocab::VocabCodec`] is the
//! word-level implementation loaded from a model directory.

pub mod vocab;

use crate::Result;
use std::collections::HashMap;

/// Text <-> token id mapping consumed by the generation layer
pub trait Codec: Send + Sync {
    /// Encode text into token ids without adding special tokens
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode token ids back into text, with tokenization spaces cleaned up
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Get the vocabulary size
    fn vocab_size(&self) -> usize;

    /// Get the end of sequence token ID
    fn eos_token_id(&self) -> Option<u32>;

    /// Get the padding token ID
    fn pad_token_id(&self) -> Option<u32>;

    /// Reserved control codes, keyed by their text
    fn control_codes(&self) -> &HashMap<String, u32>;

    /// Whether `id` is one of the reserved control codes
    fn is_control_code(&self, id: u32) -> bool {
        self.control_codes().values().any(|&code| code == id)
    }
}

/// Codec file names inside a model directory
pub const VOCAB_FILE: &str = "vocab.json";
