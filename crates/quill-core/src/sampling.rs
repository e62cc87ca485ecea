//! Step-level sampling policy
//!
//! Each decode step turns raw next-token logits into one sampled token id:
//! temperature scaling, repetition penalty, top-k and top-p truncation, then a
//! single draw from the renormalized distribution. The random generator is
//! seeded once per run and advanced exactly once per step, so a fixed seed
//! reproduces the same draws.

use crate::config::GenerationConfig;
use crate::{CoreError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Seeded sampler shared by every request of a run
pub struct Sampler {
    rng: StdRng,
    seed: u64,
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sample the next token.
    ///
    /// `context` holds every token already in the sequence (prompt and
    /// generated); it drives the repetition penalty.
    pub fn sample(&mut self, logits: &[f32], context: &[u32], config: &GenerationConfig) -> Result<u32> {
        if logits.is_empty() {
            return Err(CoreError::generation(
                "GENERATION_EMPTY_LOGITS",
                "Cannot sample from empty logits",
                "Token sampling",
                "Check that the model forward pass produces valid logits",
            ));
        }

        let mut logits = logits.to_vec();
        apply_temperature(&mut logits, config.temperature);
        apply_repetition_penalty(&mut logits, context, config.repetition_penalty);

        if config.top_k > 0 {
            apply_top_k(&mut logits, config.top_k);
        }
        if config.top_p < 1.0 {
            apply_top_p(&mut logits, config.top_p);
        }

        let probs = softmax(&logits);
        self.draw(&probs)
    }

    /// Draw one index from a probability distribution
    fn draw(&mut self, probs: &[f32]) -> Result<u32> {
        let total: f32 = probs.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(CoreError::generation(
                "GENERATION_INVALID_DISTRIBUTION",
                "Sampling distribution has no probability mass",
                "Token sampling",
                "Check the model logits for NaN or infinite values",
            ));
        }

        let target = self.rng.gen::<f32>() * total;
        let mut cumulative = 0.0;
        let mut last_candidate = 0;
        for (idx, &prob) in probs.iter().enumerate() {
            if prob <= 0.0 {
                continue;
            }
            cumulative += prob;
            last_candidate = idx;
            if target < cumulative {
                return Ok(idx as u32);
            }
        }

        // Rounding can leave `target` just above the final cumulative sum.
        Ok(last_candidate as u32)
    }
}

/// Divide logits by the temperature; 1.0 leaves them untouched
pub fn apply_temperature(logits: &mut [f32], temperature: f32) {
    if temperature == 1.0 {
        return;
    }
    for logit in logits.iter_mut() {
        *logit /= temperature;
    }
}

/// Discount logits of tokens already present in the sequence.
///
/// Each distinct token is penalized once: positive logits are divided by the
/// penalty, negative ones multiplied, so the token always becomes less likely.
pub fn apply_repetition_penalty(logits: &mut [f32], context: &[u32], penalty: f32) {
    if penalty == 1.0 {
        return;
    }

    let seen: HashSet<u32> = context.iter().copied().collect();
    for token in seen {
        if let Some(logit) = logits.get_mut(token as usize) {
            if *logit > 0.0 {
                *logit /= penalty;
            } else {
                *logit *= penalty;
            }
        }
    }
}

/// Indices sorted by descending logit; ties keep index order
fn sorted_indices(logits: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..logits.len()).collect();
    indices.sort_by(|&a, &b| logits[b].partial_cmp(&logits[a]).unwrap_or(Ordering::Equal));
    indices
}

/// Keep only the `top_k` highest logits
pub fn apply_top_k(logits: &mut [f32], top_k: usize) {
    if top_k == 0 || top_k >= logits.len() {
        return;
    }
    for idx in sorted_indices(logits).into_iter().skip(top_k) {
        logits[idx] = f32::NEG_INFINITY;
    }
}

/// Keep the smallest set of most likely tokens whose mass reaches `top_p`.
/// The most likely token always survives.
pub fn apply_top_p(logits: &mut [f32], top_p: f32) {
    if top_p >= 1.0 {
        return;
    }

    let order = sorted_indices(logits);
    let sorted: Vec<f32> = order.iter().map(|&i| logits[i]).collect();
    let probs = softmax(&sorted);

    let mut cumulative = 0.0;
    let mut cutoff = order.len();
    for (rank, prob) in probs.iter().enumerate() {
        cumulative += prob;
        if cumulative >= top_p {
            cutoff = rank + 1;
            break;
        }
    }

    for &idx in order.iter().skip(cutoff) {
        logits[idx] = f32::NEG_INFINITY;
    }
}

/// Numerically stable softmax; masked (-inf) entries get zero probability
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }

    let exp: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|x| x / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GenerationConfig {
        GenerationConfig {
            temperature: 1.0,
            top_k: 0,
            top_p: 1.0,
            repetition_penalty: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_softmax() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1]);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_with_masked_entries() {
        let probs = softmax(&[f32::NEG_INFINITY, 0.0, f32::NEG_INFINITY]);
        assert_eq!(probs, vec![0.0, 1.0, 0.0]);
        assert_eq!(softmax(&[f32::NEG_INFINITY; 2]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_temperature() {
        let mut logits = vec![2.0, -4.0];
        apply_temperature(&mut logits, 0.5);
        assert_eq!(logits, vec![4.0, -8.0]);

        let mut logits = vec![2.0, -4.0];
        apply_temperature(&mut logits, 1.0);
        assert_eq!(logits, vec![2.0, -4.0]);
    }

    #[test]
    fn test_repetition_penalty() {
        let mut logits = vec![2.0, -2.0, 3.0];
        apply_repetition_penalty(&mut logits, &[0, 1, 1], 2.0);
        assert_eq!(logits, vec![1.0, -4.0, 3.0]);

        let mut logits = vec![2.0, -2.0];
        apply_repetition_penalty(&mut logits, &[0, 1], 1.0);
        assert_eq!(logits, vec![2.0, -2.0]);
    }

    #[test]
    fn test_top_k_filtering() {
        let mut logits = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        apply_top_k(&mut logits, 3);
        assert_eq!(logits[0], f32::NEG_INFINITY);
        assert_eq!(logits[1], f32::NEG_INFINITY);
        assert_eq!(&logits[2..], &[3.0, 4.0, 5.0]);

        let mut logits = vec![1.0, 2.0];
        apply_top_k(&mut logits, 5);
        assert_eq!(logits, vec![1.0, 2.0]);
    }

    #[test]
    fn test_top_p_filtering() {
        // Probabilities 0.5, 0.25, 0.125, 0.125
        let ln = |p: f32| p.ln();
        let mut logits = vec![ln(0.125), ln(0.5), ln(0.25), ln(0.125)];
        apply_top_p(&mut logits, 0.7);
        assert_eq!(logits[0], f32::NEG_INFINITY);
        assert_eq!(logits[3], f32::NEG_INFINITY);
        assert!(logits[1].is_finite());
        assert!(logits[2].is_finite());
    }

    #[test]
    fn test_top_p_keeps_most_likely_token() {
        let mut logits = vec![0.0, 10.0, 0.0];
        apply_top_p(&mut logits, 0.01);
        assert_eq!(logits[1], 10.0);
        assert_eq!(logits[0], f32::NEG_INFINITY);
        assert_eq!(logits[2], f32::NEG_INFINITY);
    }

    #[test]
    fn test_collapsed_candidate_set_is_deterministic() {
        let mut sampler = Sampler::new(7);
        let config = GenerationConfig {
            top_k: 1,
            ..config()
        };
        for _ in 0..20 {
            assert_eq!(sampler.sample(&[0.1, 0.9, 0.3], &[], &config).unwrap(), 1);
        }
    }

    #[test]
    fn test_same_seed_same_draws() {
        let logits = vec![0.5, 0.1, 0.9, 0.3, 0.2];
        let mut a = Sampler::new(42);
        let mut b = Sampler::new(42);
        let draws_a: Vec<u32> = (0..50).map(|_| a.sample(&logits, &[], &config()).unwrap()).collect();
        let draws_b: Vec<u32> = (0..50).map(|_| b.sample(&logits, &[], &config()).unwrap()).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn test_unfiltered_sampling_follows_model_distribution() {
        // Probabilities 0.1, 0.2, 0.7
        let logits: Vec<f32> = [0.1f32, 0.2, 0.7].iter().map(|p| p.ln()).collect();
        let mut sampler = Sampler::new(1234);
        let mut counts = [0usize; 3];
        let draws = 20_000;
        for _ in 0..draws {
            counts[sampler.sample(&logits, &[], &config()).unwrap() as usize] += 1;
        }
        let freq: Vec<f64> = counts.iter().map(|&c| c as f64 / draws as f64).collect();
        assert!((freq[0] - 0.1).abs() < 0.02, "{:?}", freq);
        assert!((freq[1] - 0.2).abs() < 0.02, "{:?}", freq);
        assert!((freq[2] - 0.7).abs() < 0.02, "{:?}", freq);
    }

    #[test]
    fn test_empty_logits_error() {
        let mut sampler = Sampler::new(0);
        let err = sampler.sample(&[], &[], &config()).unwrap_err();
        assert_eq!(err.code(), "GENERATION_EMPTY_LOGITS");
    }

    #[test]
    fn test_nan_logits_error() {
        let mut sampler = Sampler::new(0);
        let err = sampler.sample(&[f32::NAN, f32::NAN], &[], &config()).unwrap_err();
        assert_eq!(err.code(), "GENERATION_INVALID_DISTRIBUTION");
    }
}
