//! ModelConfig type for the song model parameters.
//!
//! Mirrors the fields of the model directory's `config.json` that the
//! orchestrator and the ONNX wrappers need for shapes and defaults.

use serde::{Deserialize, Serialize};

/// Configuration parameters for the song model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Longest segment the language model generates in one window, in seconds.
    #[serde(rename = "max_dur")]
    pub max_duration: f32,

    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// Token frames per second of audio.
    pub frame_rate: u32,

    /// Parallel code streams per frame (mix, vocal, bgm).
    pub codebooks: u32,

    /// Token vocabulary size per codebook.
    pub vocab_size: u32,

    /// Padding/start token for the code streams.
    pub pad_token_id: i64,
}

impl ModelConfig {
    /// Audio samples produced per token frame.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate / self.frame_rate.max(1)) as usize
    }

    /// Number of token frames covering `seconds` of audio.
    pub fn frames_for(&self, seconds: f32) -> usize {
        (seconds.max(0.0) * self.frame_rate as f32).round() as usize
    }

    /// Validates the configuration for consistency.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if !(self.max_duration > 0.0) {
            return Some("max_dur must be > 0".to_string());
        }

        if self.sample_rate == 0 {
            return Some("sample_rate must be > 0".to_string());
        }

        if self.frame_rate == 0 {
            return Some("frame_rate must be > 0".to_string());
        }

        if self.sample_rate % self.frame_rate != 0 {
            return Some(format!(
                "sample_rate ({}) must be a multiple of frame_rate ({})",
                self.sample_rate, self.frame_rate
            ));
        }

        if self.codebooks != 3 {
            return Some(format!("codebooks must be 3, got {}", self.codebooks));
        }

        if self.vocab_size == 0 {
            return Some("vocab_size must be > 0".to_string());
        }

        None
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_duration: 150.0,
            sample_rate: 48000,
            frame_rate: 25,
            codebooks: 3,
            vocab_size: 16384,
            pad_token_id: 16384,
        }
    }
}
