//! Process-wide generation state
//!
//! A [`GenerationContext`] is built once at startup and passed by reference
//! into whichever driver runs. It owns the loaded model and codec, the
//! preprocessor chosen for the model family, the resolved length, and the
//! seeded sampler. Requests are processed one at a time against it.

use crate::{
    config::{DeviceType, GenerationConfig},
    family::ModelFamily,
    generation::{pipeline::GenerationPipeline, GenerationResult},
    length::resolve_length,
    model::{bigram::BigramModel, capacity_of, LanguageModel},
    postprocess::{self, CONTINUATION_MARKER},
    preprocess::{build_preprocessor, PromptPreprocessor},
    sampling::Sampler,
    tokenizer::{vocab::VocabCodec, Codec},
    CoreError, Result,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of prompt tokens kept for batch rows
pub const BATCH_PROMPT_TOKEN_LIMIT: usize = 100;

/// One unit of work: a prompt from a table row or an operator line
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt_text: String,

    /// Append the continuation-begin marker before encoding
    pub continuation_marker: bool,

    /// Keep only this many prompt tokens, dropped before generation
    pub prompt_token_limit: Option<usize>,
}

impl GenerationRequest {
    /// Request for an operator-entered prompt
    pub fn interactive(prompt_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            continuation_marker: false,
            prompt_token_limit: None,
        }
    }

    /// Request for a batch table row
    pub fn batch(title: impl Into<String>) -> Self {
        Self {
            prompt_text: title.into(),
            continuation_marker: true,
            prompt_token_limit: Some(BATCH_PROMPT_TOKEN_LIMIT),
        }
    }
}

/// Encoded prefix sent to the model
#[derive(Debug, Clone)]
pub struct EncodedPrompt {
    /// Full prefix: padding tokens (if any) followed by prompt tokens
    pub tokens: Vec<u32>,

    /// The caller's prompt tokens after truncation, without padding
    pub prompt_tokens: Vec<u32>,

    pub language: Option<u32>,
}

impl EncodedPrompt {
    /// Number of leading padding tokens in [`EncodedPrompt::tokens`]
    pub fn padding_len(&self) -> usize {
        self.tokens.len().saturating_sub(self.prompt_tokens.len())
    }
}

/// Everything a driver needs to post-process one request
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub encoded: EncodedPrompt,
    pub result: GenerationResult,
}

pub struct GenerationContext {
    family: ModelFamily,
    model: Arc<dyn LanguageModel>,
    codec: Arc<dyn Codec>,
    preprocessor: Box<dyn PromptPreprocessor>,
    sampler: Sampler,
    config: GenerationConfig,
    max_length: usize,
    decoded_padding: Option<String>,
    device: DeviceType,
}

impl GenerationContext {
    /// Build a context around an already loaded model and codec
    pub fn new(
        family: ModelFamily,
        model: Arc<dyn LanguageModel>,
        codec: Arc<dyn Codec>,
        config: GenerationConfig,
    ) -> Result<Self> {
        config.validate()?;
        let device = config.device.select(false)?;

        if model.vocab_size() != codec.vocab_size() {
            return Err(CoreError::model(
                "MODEL_VOCAB_MISMATCH",
                format!(
                    "Model vocabulary ({}) and codec vocabulary ({}) differ",
                    model.vocab_size(),
                    codec.vocab_size()
                ),
                "Pairing model and codec",
                "Load the model and codec from the same model directory",
            ));
        }

        let preprocessor = build_preprocessor(family.preprocessor_kind(), &config, model.as_ref())?;
        let max_length = resolve_length(config.length, capacity_of(model.as_ref()));

        let decoded_padding = match preprocessor.padding() {
            Some(padding) => Some(codec.decode(&codec.encode(padding)?)?),
            None => None,
        };

        info!(
            "Generation context ready: family={}, model={}, max_length={}, seed={}, device={:?}",
            family,
            model.name(),
            max_length,
            config.seed,
            device
        );

        Ok(Self {
            family,
            model,
            codec,
            preprocessor,
            sampler: Sampler::new(config.seed),
            config,
            max_length,
            decoded_padding,
            device,
        })
    }

    /// Load the bundled model and codec from a model directory
    pub fn load(family: ModelFamily, model_dir: &Path, config: GenerationConfig) -> Result<Self> {
        config.validate()?;
        info!("Loading {} model from {}", family, model_dir.display());

        let codec = VocabCodec::from_dir(model_dir)?;
        let model = BigramModel::from_dir(model_dir)?;
        Self::new(family, Arc::new(model), Arc::new(codec), config)
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn model(&self) -> &dyn LanguageModel {
        self.model.as_ref()
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn device(&self) -> DeviceType {
        self.device
    }

    /// Resolved generation length, prompt included
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Sequence length the decode loop may reach for an encoded prompt.
    ///
    /// The padding passage sits outside the resolved length, so it is added on
    /// top. The sum never exceeds the model's declared capacity.
    pub fn token_budget(&self, encoded: &EncodedPrompt) -> usize {
        let budget = self.max_length.saturating_add(encoded.padding_len());
        match usize::try_from(capacity_of(self.model.as_ref())) {
            Ok(capacity) if capacity > 0 => budget.min(capacity),
            _ => budget,
        }
    }

    /// Preprocess and encode a request
    pub fn encode(&self, request: &GenerationRequest) -> Result<EncodedPrompt> {
        let prompt = if request.continuation_marker {
            format!("{}{}", request.prompt_text, CONTINUATION_MARKER)
        } else {
            request.prompt_text.clone()
        };

        let prepared = self.preprocessor.prepare(&prompt, self.codec.as_ref())?;

        let (tokens, prompt_tokens) = match request.prompt_token_limit {
            // Truncation bounds the caller's prompt; padding is added afterwards.
            Some(limit) => {
                let mut prompt_tokens = self.codec.encode(&prepared.text)?;
                prompt_tokens.truncate(limit);
                let mut tokens = match &prepared.padding {
                    Some(padding) => self.codec.encode(padding)?,
                    None => Vec::new(),
                };
                tokens.extend_from_slice(&prompt_tokens);
                (tokens, prompt_tokens)
            }
            None => {
                let tokens = self.codec.encode(&prepared.full_text())?;
                let prompt_tokens = if prepared.padding.is_some() {
                    self.codec.encode(&prepared.text)?
                } else {
                    tokens.clone()
                };
                (tokens, prompt_tokens)
            }
        };

        debug!(
            "Encoded prompt: {} tokens ({} from the caller's prompt)",
            tokens.len(),
            prompt_tokens.len()
        );

        Ok(EncodedPrompt {
            tokens,
            prompt_tokens,
            language: prepared.language,
        })
    }

    /// Encode and decode one request to completion
    pub fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let encoded = self.encode(request)?;
        let budget = self.token_budget(&encoded);
        let pipeline = GenerationPipeline::new(self.model.as_ref(), self.codec.as_ref());
        let result = pipeline.generate(
            &mut self.sampler,
            &encoded.tokens,
            budget,
            encoded.language,
            &self.config,
        )?;
        Ok(GenerationOutput { encoded, result })
    }

    /// Remove the padding passage from the front of decoded text
    pub fn strip_padding<'t>(&self, text: &'t str) -> &'t str {
        match &self.decoded_padding {
            Some(padding) => postprocess::strip_padding(text, padding),
            None => text,
        }
    }
}
