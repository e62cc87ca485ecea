//! Word-level vocabulary codec
//!
//! Text is NFC-normalized, split into words, numbers, punctuation and
//! `<angle-bracket>` markers, and each piece is looked up in the vocabulary.
//! Pieces missing from the vocabulary map to the unknown token.

use crate::tokenizer::{Codec, VOCAB_FILE};
use crate::{CoreError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Punctuation that attaches to the preceding piece when decoding
const CLOSING_PUNCTUATION: &[&str] = &[".", ",", "!", "?", ";", ":", ")", "'", "%"];

/// On-disk vocabulary description
#[derive(Debug, Clone, Deserialize)]
pub struct VocabFile {
    /// Tokens in id order
    pub tokens: Vec<String>,

    #[serde(default = "default_unk")]
    pub unk_token: String,

    #[serde(default)]
    pub eos_token: Option<String>,

    #[serde(default)]
    pub pad_token: Option<String>,

    /// Tokens reserved as control codes
    #[serde(default)]
    pub control_codes: Vec<String>,
}

fn default_unk() -> String {
    "<unk>".to_string()
}

/// Vocabulary container for token-to-id and id-to-token mappings
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    unk_token_id: u32,
    eos_token_id: Option<u32>,
    pad_token_id: Option<u32>,
    control_codes: HashMap<String, u32>,
}

impl Vocabulary {
    /// Build a vocabulary from its file description
    pub fn from_vocab_file(file: VocabFile) -> Result<Self> {
        let mut token_to_id = HashMap::with_capacity(file.tokens.len());
        for (id, token) in file.tokens.iter().enumerate() {
            if token_to_id.insert(token.clone(), id as u32).is_some() {
                return Err(CoreError::tokenizer(
                    "TOKENIZER_DUPLICATE_TOKEN",
                    format!("Token '{}' appears more than once", token),
                    "Building vocabulary",
                    "Each vocabulary entry must be unique",
                ));
            }
        }

        let lookup = |token: &str, role: &str| {
            token_to_id.get(token).copied().ok_or_else(|| {
                CoreError::tokenizer(
                    "TOKENIZER_MISSING_SPECIAL_TOKEN",
                    format!("The {} token '{}' is not in the vocabulary", role, token),
                    "Building vocabulary",
                    "Add the token to the `tokens` list",
                )
            })
        };

        let unk_token_id = lookup(&file.unk_token, "unknown")?;
        let eos_token_id = file.eos_token.as_deref().map(|t| lookup(t, "end of sequence")).transpose()?;
        let pad_token_id = file.pad_token.as_deref().map(|t| lookup(t, "padding")).transpose()?;

        let mut control_codes = HashMap::with_capacity(file.control_codes.len());
        for code in &file.control_codes {
            control_codes.insert(code.clone(), lookup(code, "control code")?);
        }

        Ok(Self {
            token_to_id,
            id_to_token: file.tokens,
            unk_token_id,
            eos_token_id,
            pad_token_id,
            control_codes,
        })
    }

    /// Get token ID, falling back to the unknown token
    pub fn token_to_id(&self, token: &str) -> u32 {
        self.token_to_id.get(token).copied().unwrap_or(self.unk_token_id)
    }

    /// Get token by ID
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(|s| s.as_str())
    }

    pub fn size(&self) -> usize {
        self.id_to_token.len()
    }
}

/// Word-level codec backed by a [`Vocabulary`]
pub struct VocabCodec {
    vocab: Vocabulary,
    pattern: Regex,
}

impl VocabCodec {
    /// Create a codec from an in-memory vocabulary description
    pub fn new(file: VocabFile) -> Result<Self> {
        let pattern = Regex::new(r"<[^<>\s]+>|\p{L}+(?:'\p{L}+)?|\p{N}+|[^\s\p{L}\p{N}]").map_err(|e| {
            CoreError::tokenizer(
                "TOKENIZER_PATTERN_ERROR",
                format!("Failed to compile pre-tokenizer pattern: {}", e),
                "Creating vocabulary codec",
                "This is a bug in the pre-tokenizer pattern",
            )
        })?;

        Ok(Self {
            vocab: Vocabulary::from_vocab_file(file)?,
            pattern,
        })
    }

    /// Load `vocab.json` from a model directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(VOCAB_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CoreError::tokenizer_with_path(
                "TOKENIZER_VOCAB_FILE_OPEN_ERROR",
                format!("Failed to open vocabulary file: {}", e),
                "Loading codec from model directory",
                "Check that the model directory contains a vocab.json file",
                &path,
            )
        })?;

        let file: VocabFile = serde_json::from_str(&content).map_err(|e| {
            CoreError::tokenizer_with_path(
                "TOKENIZER_VOCAB_JSON_PARSE_ERROR",
                format!("Failed to parse JSON vocabulary: {}", e),
                "Loading codec from model directory",
                "Check JSON format and syntax",
                &path,
            )
        })?;

        let codec = Self::new(file)?;
        tracing::debug!("Loaded vocabulary with {} tokens from {}", codec.vocab.size(), path.display());
        Ok(codec)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }
}

impl Codec for VocabCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let normalized: String = text.nfc().collect();
        Ok(self
            .pattern
            .find_iter(&normalized)
            .map(|piece| self.vocab.token_to_id(piece.as_str()))
            .collect())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        let mut text = String::new();
        for &id in tokens {
            let piece = self.vocab.id_to_token(id).ok_or_else(|| {
                CoreError::tokenizer(
                    "TOKENIZER_UNKNOWN_ID",
                    format!("Token id {} is outside the vocabulary", id),
                    "Decoding token ids",
                    "Check that the model and codec come from the same model directory",
                )
            })?;

            if !text.is_empty() && !CLOSING_PUNCTUATION.contains(&piece) {
                text.push(' ');
            }
            text.push_str(piece);
        }
        Ok(text)
    }

    fn vocab_size(&self) -> usize {
        self.vocab.size()
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.vocab.eos_token_id
    }

    fn pad_token_id(&self) -> Option<u32> {
        self.vocab.pad_token_id
    }

    fn control_codes(&self) -> &HashMap<String, u32> {
        &self.vocab.control_codes
    }
}
