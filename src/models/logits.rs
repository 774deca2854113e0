//! Logits processing for the song language model.
//!
//! Handles classifier-free guidance, repetition penalty and
//! temperature/top-k/top-p sampling of one frame of codes.

use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};

use ndarray::{s, Array, Array2, ArrayView2, Axis, Ix3, IxDyn};
use ort::tensor::ArrayExtensions;
use ort::value::DynValue;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

use crate::error::{Result, SongGenError};

use super::session::extract_f32;

/// Logit divisor applied to tokens seen in the record window.
pub const REPETITION_PENALTY: f32 = 1.1;

/// Truncation settings for one sampling step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    /// 0 disables top-k.
    pub top_k: usize,
    /// 0.0 disables nucleus truncation.
    pub top_p: f32,
}

/// Wrapper around `[codebooks, vocab]` logits of one frame.
pub struct Logits(Array2<f32>);

impl Deref for Logits {
    type Target = Array2<f32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Logits {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Debug for Logits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logits({:?})", self.0.dim())
    }
}

impl Logits {
    pub fn new(logits: Array2<f32>) -> Self {
        Self(logits)
    }

    /// Reads `[2, codebooks, vocab]` logits and applies classifier-free guidance.
    ///
    /// Batch entry 0 is conditional, entry 1 unconditional.
    pub fn from_guided_dyn_value(value: &DynValue, cfg_coef: f32) -> Result<Self> {
        let (shape, data) = extract_f32(value, "logits")?;

        let arr = Array::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| SongGenError::generation_failed(format!("Failed to create array: {}", e)))?
            .into_dimensionality::<Ix3>()
            .map_err(|e| SongGenError::generation_failed(format!("Expected 3D logits: {}", e)))?;

        if arr.len_of(Axis(0)) != 2 {
            return Err(SongGenError::generation_failed(format!(
                "Expected a guidance batch of 2, got {}",
                arr.len_of(Axis(0))
            )));
        }

        let cond = arr.slice(s![0, .., ..]);
        let uncond = arr.slice(s![1, .., ..]);
        Ok(Self::apply_free_guidance(cond, uncond, cfg_coef))
    }

    /// Applies classifier-free guidance:
    /// `guided = uncond + (cond - uncond) * scale`
    pub fn apply_free_guidance(cond: ArrayView2<f32>, uncond: ArrayView2<f32>, scale: f32) -> Self {
        Self((&cond - &uncond) * scale + uncond)
    }

    /// Penalizes tokens that already occur in `recent` (`[codebooks, frames]`).
    ///
    /// Positive logits are divided by `penalty`, negative ones multiplied.
    pub fn penalize_repeats(&mut self, recent: ArrayView2<i64>, penalty: f32) {
        let vocab = self.0.len_of(Axis(1));
        for (mut row, history) in self.0.axis_iter_mut(Axis(0)).zip(recent.axis_iter(Axis(0))) {
            let mut seen = vec![false; vocab];
            for &token in history.iter() {
                if token >= 0 && (token as usize) < vocab {
                    seen[token as usize] = true;
                }
            }
            for (logit, _) in row.iter_mut().zip(seen).filter(|(_, s)| *s) {
                *logit = if *logit > 0.0 {
                    *logit / penalty
                } else {
                    *logit * penalty
                };
            }
        }
    }

    /// Samples one token per codebook.
    pub fn sample<R: Rng + ?Sized>(&self, params: &SamplingParams, rng: &mut R) -> Result<Vec<i64>> {
        let scaled = &self.0 / params.temperature.max(f32::EPSILON);
        let probabilities = scaled.softmax(Axis(1));

        let mut tokens = Vec::with_capacity(probabilities.len_of(Axis(0)));
        for row in probabilities.axis_iter(Axis(0)) {
            // Vec<(token_id, softmax_prob)>
            let mut candidates = row
                .iter()
                .enumerate()
                .map(|(i, p)| (i as i64, *p))
                .collect::<Vec<_>>();

            // Most probable first.
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

            if params.top_k > 0 {
                candidates.truncate(params.top_k);
            }

            if params.top_p > 0.0 {
                let mut cumulative = 0.0;
                let mut keep = candidates.len();
                for (i, (_, p)) in candidates.iter().enumerate() {
                    cumulative += p;
                    if cumulative >= params.top_p {
                        keep = i + 1;
                        break;
                    }
                }
                candidates.truncate(keep.max(1));
            }

            let distribution = WeightedIndex::new(candidates.iter().map(|e| e.1)).map_err(|e| {
                SongGenError::generation_failed(format!("Invalid sampling distribution: {}", e))
            })?;

            tokens.push(candidates[distribution.sample(rng)].0);
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(top_k: usize, top_p: f32) -> SamplingParams {
        SamplingParams {
            temperature: 1.0,
            top_k,
            top_p,
        }
    }

    #[test]
    fn free_guidance() {
        let cond = array![[10.0f32, -1.0, 3.0]];
        let uncond = array![[-1.0f32, 1.0, 11.0]];
        let logits = Logits::apply_free_guidance(cond.view(), uncond.view(), 1.5);
        assert_eq!(logits.shape(), &[1, 3]);
        assert_eq!(logits[[0, 0]], -1.0 + 11.0 * 1.5);

        // Scale 1 keeps the conditional logits.
        let logits = Logits::apply_free_guidance(cond.view(), uncond.view(), 1.0);
        assert_eq!(*logits, cond);
    }

    #[test]
    fn top_k_one_is_greedy() {
        let logits = Logits::new(array![[0.1f32, 5.0, 0.2], [3.0, 0.0, 0.1]]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..10 {
            assert_eq!(logits.sample(&params(1, 0.0), &mut rng).unwrap(), vec![1, 0]);
        }
    }

    #[test]
    fn small_top_p_is_greedy() {
        let logits = Logits::new(array![[0.1f32, 0.2, 6.0]]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(logits.sample(&params(0, 0.01), &mut rng).unwrap(), vec![2]);
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let logits = Logits::new(Array2::from_shape_fn((3, 64), |(k, v)| ((k + v) % 7) as f32));
        let a = logits
            .sample(&params(50, 0.0), &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();
        let b = logits
            .sample(&params(50, 0.0), &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|t| (0..64).contains(t)));
    }

    #[test]
    fn repeats_are_penalized() {
        let mut logits = Logits::new(array![[2.0f32, -2.0, 1.0]]);
        logits.penalize_repeats(array![[0i64, 1, 1]].view(), 2.0);
        assert_eq!(*logits, array![[1.0f32, -4.0, 1.0]]);
    }
}
