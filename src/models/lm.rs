//! Song language model wrapper.
//!
//! Tokenizes lyrics and description, then generates code frames one step at
//! a time with classifier-free guidance. Each step sees the text, the prompt
//! codes and a sliding window of the frames generated so far.

use std::borrow::Cow;
use std::path::Path;

use ndarray::{Array2, Array3, ArrayView3, Axis};
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::{Result, SongGenError};
use crate::types::{GenerationParameters, ModelConfig};

use super::logits::{Logits, SamplingParams, REPETITION_PENALTY};
use super::session::{load_session, SessionOptions};
use super::Precision;

/// Full precision step model.
pub const LM_FILE: &str = "lm.onnx";

/// Optional half precision step model.
pub const LM_HALF_FILE: &str = "lm_fp16.onnx";

/// Tokenizer shared by lyrics and description.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Frame positions of the generation window.
///
/// `window` frames of context are visible at once; once full, the window
/// start advances by `stride` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub total: usize,
    pub window: usize,
    pub stride: usize,
}

impl WindowPlan {
    pub fn new(config: &ModelConfig, params: &GenerationParameters) -> Self {
        let window = config.frames_for(config.max_duration).max(1);
        Self {
            total: config.frames_for(params.duration).max(1),
            window,
            stride: config.frames_for(params.extend_stride).clamp(1, window),
        }
    }

    /// First visible frame when generating frame `step`, given the previous start.
    pub fn advance(&self, start: usize, step: usize) -> usize {
        if step - start >= self.window {
            start + self.stride
        } else {
            start
        }
    }
}

/// Language model combining tokenizer and step sessions.
pub struct LanguageModel {
    tokenizer: Tokenizer,
    full: Session,
    half: Option<Session>,
    config: ModelConfig,
}

impl LanguageModel {
    /// Loads `tokenizer.json`, `lm.onnx` and, when present, `lm_fp16.onnx`.
    pub fn load(model_dir: &Path, config: ModelConfig, options: &SessionOptions) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(model_dir.join(TOKENIZER_FILE)).map_err(|e| {
            SongGenError::model_load_failed(format!("Failed to load tokenizer: {}", e))
        })?;

        tokenizer
            .with_padding(None)
            .with_truncation(None)
            .map_err(|e| {
                SongGenError::model_load_failed(format!("Failed to configure tokenizer: {}", e))
            })?;

        let full = load_session(&model_dir.join(LM_FILE), options)?;

        let half_path = model_dir.join(LM_HALF_FILE);
        let half = if half_path.is_file() {
            Some(load_session(&half_path, options)?)
        } else {
            debug!("{} not found, half precision uses {}", LM_HALF_FILE, LM_FILE);
            None
        };

        Ok(Self {
            tokenizer,
            full,
            half,
            config,
        })
    }

    /// Tokenizes description and lyrics as a sequence pair.
    pub fn encode_text(&self, lyrics: &str, description: &str) -> Result<Vec<i64>> {
        let encoding = self
            .tokenizer
            .encode((description, lyrics), true)
            .map_err(|e| SongGenError::generation_failed(format!("Tokenization failed: {}", e)))?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|e| *e as i64).collect();
        if ids.is_empty() {
            ids.push(0);
        }
        Ok(ids)
    }

    /// Generates `[1, codebooks, frames]` codes.
    ///
    /// `prompt` is `[1, codebooks, P]`. The unconditional half of the guidance
    /// batch sees zeroed text and a padding prompt.
    pub fn generate(
        &mut self,
        text_ids: &[i64],
        prompt: ArrayView3<i64>,
        params: &GenerationParameters,
        precision: Precision,
        seed: u64,
    ) -> Result<Array3<i64>> {
        let codebooks = self.config.codebooks as usize;
        let pad = self.config.pad_token_id;
        let vocab = self.config.vocab_size as i64;
        let plan = WindowPlan::new(&self.config, params);

        if prompt.len_of(Axis(1)) != codebooks {
            return Err(SongGenError::generation_failed(format!(
                "prompt has {} codebooks, model expects {}",
                prompt.len_of(Axis(1)),
                codebooks
            )));
        }

        let text_value = guidance_batch(&[text_ids.len()], text_ids, 0)?;
        let prompt_len = prompt.len_of(Axis(2));
        let prompt_data: Vec<i64> = prompt.iter().copied().collect();
        let prompt_value = guidance_batch(&[codebooks, prompt_len], &prompt_data, pad)?;

        let sampling = SamplingParams {
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let session = match (precision, self.half.as_mut()) {
            (Precision::Half, Some(half)) => half,
            _ => &mut self.full,
        };

        info!(
            frames = plan.total,
            window = plan.window,
            stride = plan.stride,
            ?precision,
            "generating tokens"
        );

        // codes[k][t]
        let mut codes: Vec<Vec<i64>> = vec![Vec::with_capacity(plan.total); codebooks];
        let mut start = 0;

        for step in 0..plan.total {
            let next_start = plan.advance(start, step);
            if next_start != start {
                debug!(step, start = next_start, "extending generation window");
                start = next_start;
            }

            // A padding frame leads every context so the input is never empty.
            let context_len = step - start + 1;
            let mut context = Vec::with_capacity(codebooks * context_len);
            for row in &codes {
                context.push(pad);
                context.extend_from_slice(&row[start..step]);
            }
            let codes_value = guidance_batch(&[codebooks, context_len], &context, pad)?;

            let session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
                (Cow::from("text_ids"), SessionInputValue::from(text_value.view())),
                (Cow::from("prompt_codes"), SessionInputValue::from(prompt_value.view())),
                (Cow::from("codes"), SessionInputValue::from(codes_value.view())),
            ];

            let mut outputs = session.run(session_inputs).map_err(|e| {
                SongGenError::generation_failed(format!("Language model step {} failed: {}", step, e))
            })?;

            let logits_value = outputs
                .remove("logits")
                .ok_or_else(|| SongGenError::generation_failed("logits not found in output"))?;
            let mut logits = Logits::from_guided_dyn_value(&logits_value, params.cfg_coef)?;

            if params.record_tokens && step > 0 {
                let from = step.saturating_sub(params.record_window);
                let recent = Array2::from_shape_fn((codebooks, step - from), |(k, t)| {
                    codes[k][from + t]
                });
                logits.penalize_repeats(recent.view(), REPETITION_PENALTY);
            }

            let frame = logits.sample(&sampling, &mut rng)?;
            if frame.len() != codebooks {
                return Err(SongGenError::generation_failed(format!(
                    "sampled {} codebooks, expected {}",
                    frame.len(),
                    codebooks
                )));
            }
            for (row, token) in codes.iter_mut().zip(frame) {
                row.push(token.clamp(0, vocab - 1));
            }
        }

        let flat: Vec<i64> = codes.into_iter().flatten().collect();
        Array3::from_shape_vec((1, codebooks, plan.total), flat)
            .map_err(|e| SongGenError::generation_failed(e.to_string()))
    }
}

/// Builds a `[2, ..dims]` tensor: `data` first, then the same shape filled with `fill`.
fn guidance_batch(dims: &[usize], data: &[i64], fill: i64) -> Result<DynValue> {
    let mut shape = Vec::with_capacity(dims.len() + 1);
    shape.push(2usize);
    shape.extend_from_slice(dims);

    let mut combined = Vec::with_capacity(data.len() * 2);
    combined.extend_from_slice(data);
    combined.resize(data.len() * 2, fill);

    let tensor = Tensor::from_array((shape, combined)).map_err(|e| {
        SongGenError::generation_failed(format!("Failed to create input tensor: {}", e))
    })?;
    Ok(tensor.into_dyn())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_plan_from_params() {
        let config = ModelConfig {
            max_duration: 10.0,
            frame_rate: 25,
            ..ModelConfig::default()
        };
        let params = GenerationParameters {
            duration: 30.0,
            extend_stride: 5.0,
            ..GenerationParameters::default()
        };

        let plan = WindowPlan::new(&config, &params);
        assert_eq!(plan.total, 750);
        assert_eq!(plan.window, 250);
        assert_eq!(plan.stride, 125);
    }

    #[test]
    fn window_slides_by_stride() {
        let plan = WindowPlan {
            total: 20,
            window: 8,
            stride: 3,
        };

        let mut start = 0;
        let mut starts = Vec::new();
        for step in 0..plan.total {
            start = plan.advance(start, step);
            assert!(step - start <= plan.window);
            starts.push(start);
        }
        assert_eq!(starts[7], 0);
        assert_eq!(starts[8], 3);
        assert_eq!(starts[11], 6);
        assert_eq!(starts[19], 12);
    }

    #[test]
    fn stride_clamped_to_window() {
        let config = ModelConfig {
            max_duration: 2.0,
            ..ModelConfig::default()
        };
        let params = GenerationParameters {
            duration: 10.0,
            extend_stride: 60.0,
            ..GenerationParameters::default()
        };
        let plan = WindowPlan::new(&config, &params);
        assert_eq!(plan.stride, plan.window);
    }
}
