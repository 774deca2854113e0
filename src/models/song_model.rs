//! ONNX Runtime song model.
//!
//! Combines the language model, the prompt encoder and the codec decoders
//! behind the [`SongModel`] trait.

use std::path::Path;
use std::time::Instant;

use ndarray::{concatenate, Array3, Axis};
use tracing::{debug, info};

use crate::conditioning::Conditioning;
use crate::error::{Result, SongGenError};
use crate::types::{
    GenerationParameters, ModelConfig, StemSet, SynthesisMode, SynthesizedAudio, TokenSequence,
    TokenTensor, Waveform,
};

use super::codec::{CodecDecoder, PromptEncoder};
use super::lm::LanguageModel;
use super::loader::{check_models, load_model_config};
use super::session::SessionOptions;
use super::{Precision, SongModel, TokenInput};

/// Complete set of loaded song model sessions.
pub struct OnnxSongModel {
    lm: LanguageModel,
    prompt_encoder: PromptEncoder,
    codec: CodecDecoder,
    config: ModelConfig,
    params: GenerationParameters,
}

impl OnnxSongModel {
    /// Loads all sessions from a model directory.
    ///
    /// The directory should contain:
    /// - `tokenizer.json` - lyrics/description tokenizer
    /// - `lm.onnx` - language model step
    /// - `prompt_encoder.onnx` - reference stems to prompt codes
    /// - `codec_decoder.onnx` - codes to mixed audio
    /// - `separate_decoder.onnx` - codes to vocal and bgm tracks
    ///
    /// Optionally:
    /// - `lm_fp16.onnx` - half precision language model
    /// - `config.json` - model configuration (uses defaults if not present)
    pub fn load(model_dir: &Path, options: &SessionOptions) -> Result<Self> {
        check_models(model_dir)?;
        let config = load_model_config(model_dir)?;
        let start = Instant::now();

        debug!("loading language model");
        let lm = LanguageModel::load(model_dir, config.clone(), options)?;

        debug!("loading prompt encoder");
        let prompt_encoder = PromptEncoder::load(model_dir, config.sample_rate, options)?;

        debug!("loading codec decoders");
        let codec = CodecDecoder::load(model_dir, config.clone(), options)?;

        info!(
            path = %model_dir.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "song model loaded"
        );

        Ok(Self {
            lm,
            prompt_encoder,
            codec,
            params: GenerationParameters::defaults_for(&config),
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Parameters applied by the last `configure` call.
    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    /// Prompt codes for the language model, `[1, codebooks, P]`.
    fn prompt_codes(&mut self, conditioning: &Conditioning) -> Result<TokenTensor> {
        match conditioning {
            Conditioning::None => Ok(pad_prompt(&self.config)),
            Conditioning::Tokens(stems) => token_prompt(stems),
            Conditioning::Waveforms(stems) => self.prompt_encoder.encode(stems),
        }
    }
}

impl SongModel for OnnxSongModel {
    fn configure(&mut self, params: &GenerationParameters) -> Result<()> {
        params.validate()?;
        self.params = params.clone();
        Ok(())
    }

    fn generate_tokens(&mut self, input: &TokenInput<'_>, precision: Precision) -> Result<TokenSequence> {
        let text_ids = self.lm.encode_text(input.lyrics, input.description)?;
        let prompt = self.prompt_codes(input.conditioning)?;

        debug!(
            text_tokens = text_ids.len(),
            prompt_frames = prompt.len_of(Axis(2)),
            conditioning = input.conditioning.as_str(),
            "prepared language model inputs"
        );

        let codes = self
            .lm
            .generate(&text_ids, prompt.view(), &self.params, precision, input.seed)?;
        Ok(TokenSequence::new(codes))
    }

    fn synthesize(
        &mut self,
        tokens: TokenSequence,
        stems: Option<&StemSet<Waveform>>,
        mode: SynthesisMode,
        precision: Precision,
    ) -> Result<SynthesizedAudio> {
        if precision == Precision::Half {
            debug!("codec runs at full precision only");
        }
        self.codec.decode(tokens, stems, mode)
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn max_duration(&self) -> f32 {
        self.config.max_duration
    }
}

/// A single padding frame.
fn pad_prompt(config: &ModelConfig) -> TokenTensor {
    Array3::from_elem((1, config.codebooks as usize, 1), config.pad_token_id)
}

/// Stacks `[1, 1, T]` prompt, vocal and bgm stems into `[1, 3, T]`.
fn token_prompt(stems: &StemSet<TokenTensor>) -> Result<TokenTensor> {
    concatenate(
        Axis(1),
        &[stems.prompt.view(), stems.vocal.view(), stems.bgm.view()],
    )
    .map_err(|e| SongGenError::generation_failed(format!("Mismatched prompt stems: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn pad_prompt_shape() {
        let config = ModelConfig::default();
        let prompt = pad_prompt(&config);
        assert_eq!(prompt.dim(), (1, 3, 1));
        assert!(prompt.iter().all(|t| *t == config.pad_token_id));
    }

    #[test]
    fn token_stems_are_restacked() {
        let stems = StemSet::new(
            Array3::from_elem((1, 1, 4), 1i64),
            Array3::from_elem((1, 1, 4), 2i64),
            Array3::from_elem((1, 1, 4), 3i64),
        );
        let prompt = token_prompt(&stems).unwrap();
        assert_eq!(prompt.dim(), (1, 3, 4));
        assert_eq!(prompt[[0, 0, 0]], 1);
        assert_eq!(prompt[[0, 2, 3]], 3);
    }

    #[test]
    fn mismatched_token_stems_rejected() {
        let stems = StemSet::new(
            Array3::<i64>::zeros((1, 1, 4)),
            Array3::<i64>::zeros((1, 1, 5)),
            Array3::<i64>::zeros((1, 1, 4)),
        );
        assert_eq!(token_prompt(&stems).unwrap_err().code, ErrorCode::GenerationFailed);
    }

    #[test]
    fn load_requires_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxSongModel::load(dir.path(), &SessionOptions::default());
        assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::ModelNotFound));
    }
}
