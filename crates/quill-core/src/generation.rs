//! Generation results and the autoregressive decode loop

pub mod pipeline;

use serde::Serialize;

/// Result of decoding one request
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Full sequence: prompt tokens followed by generated tokens
    pub tokens: Vec<u32>,

    /// Number of leading tokens that came from the prompt
    pub prompt_len: usize,

    /// Decoded full sequence
    pub text: String,

    /// Reason generation stopped
    pub finish_reason: FinishReason,

    /// Generation statistics
    pub stats: GenerationStats,
}

impl GenerationResult {
    /// Tokens produced by the sampler, without the prompt
    pub fn generated_tokens(&self) -> &[u32] {
        &self.tokens[self.prompt_len..]
    }
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Reached the resolved length
    MaxLength,

    /// Decoded output contains the stop token
    StopSequence,

    /// End of sequence token generated
    EndOfSequence,
}

/// Statistics about the generation process
#[derive(Debug, Clone, Serialize)]
pub struct GenerationStats {
    pub prompt_tokens: usize,

    pub generated_tokens: usize,

    /// Total generation time (ms)
    pub total_time_ms: f64,

    pub tokens_per_second: f64,
}
