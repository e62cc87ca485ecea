//! Autoregressive decode loop driving the sampling policy

use crate::{
    config::GenerationConfig,
    generation::{FinishReason, GenerationResult, GenerationStats},
    model::LanguageModel,
    sampling::Sampler,
    tokenizer::Codec,
    Result,
};
use std::time::Instant;
use tracing::{debug, trace};

/// Runs one request through the model, one sampled token per step
pub struct GenerationPipeline<'a> {
    model: &'a dyn LanguageModel,
    codec: &'a dyn Codec,
}

impl<'a> GenerationPipeline<'a> {
    pub fn new(model: &'a dyn LanguageModel, codec: &'a dyn Codec) -> Self {
        Self { model, codec }
    }

    /// Extend `prompt` until the sequence holds `max_length` tokens, an end of
    /// sequence token is sampled, or the stop token appears in the output.
    pub fn generate(
        &self,
        sampler: &mut Sampler,
        prompt: &[u32],
        max_length: usize,
        language: Option<u32>,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let start_time = Instant::now();
        let eos = self.codec.eos_token_id();
        let stop_token = config.stop_token();

        let mut tokens = prompt.to_vec();
        let mut finish_reason = FinishReason::MaxLength;

        while tokens.len() < max_length {
            let logits = self.model.forward(&tokens, language)?;
            let next = sampler.sample(&logits, &tokens, config)?;
            tokens.push(next);
            trace!("Sampled token {} at position {}", next, tokens.len() - 1);

            if Some(next) == eos {
                finish_reason = FinishReason::EndOfSequence;
                break;
            }

            if let Some(stop) = stop_token {
                let generated = self.codec.decode(&tokens[prompt.len()..])?;
                if generated.contains(stop) {
                    finish_reason = FinishReason::StopSequence;
                    break;
                }
            }
        }

        let text = self.codec.decode(&tokens)?;

        let elapsed = start_time.elapsed();
        let generated_tokens = tokens.len() - prompt.len();
        let tokens_per_second = if elapsed.as_secs_f64() > 0.0 {
            generated_tokens as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        debug!(
            "Generated {} tokens after a {}-token prompt ({:?})",
            generated_tokens,
            prompt.len(),
            finish_reason
        );

        Ok(GenerationResult {
            tokens,
            prompt_len: prompt.len(),
            text,
            finish_reason,
            stats: GenerationStats {
                prompt_tokens: prompt.len(),
                generated_tokens,
                total_time_ms: elapsed.as_secs_f64() * 1000.0,
                tokens_per_second,
            },
        })
    }
}
