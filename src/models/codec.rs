//! Prompt encoder and codec decoders.
//!
//! The prompt encoder turns reference stems into prompt codes for the
//! language model. The codec decoders render generated codes to audio, either
//! as one mix or as separate vocal and accompaniment tracks.

use std::borrow::Cow;
use std::path::Path;

use ndarray::{s, Array2, Array3};
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use tracing::debug;

use crate::audio::{resample, to_stereo};
use crate::error::{Result, SongGenError};
use crate::types::{
    ModelConfig, StemSet, SynthesisMode, SynthesizedAudio, TokenSequence, TokenTensor, Waveform,
};

use super::session::{extract_f32, extract_i64, load_session, SessionOptions};

/// Reference stems to prompt codes.
pub const PROMPT_ENCODER_FILE: &str = "prompt_encoder.onnx";

/// Codes to the full mix.
pub const CODEC_DECODER_FILE: &str = "codec_decoder.onnx";

/// Codes to vocal and accompaniment tracks.
pub const SEPARATE_DECODER_FILE: &str = "separate_decoder.onnx";

/// Encodes waveform stems into `[1, codebooks, P]` prompt codes.
pub struct PromptEncoder {
    session: Session,
    sample_rate: u32,
}

impl PromptEncoder {
    pub fn load(model_dir: &Path, sample_rate: u32, options: &SessionOptions) -> Result<Self> {
        let session = load_session(&model_dir.join(PROMPT_ENCODER_FILE), options)?;
        Ok(Self {
            session,
            sample_rate,
        })
    }

    /// Encodes prompt, vocal and bgm stems.
    ///
    /// Stems are brought to stereo at the model rate and cut to the shortest.
    pub fn encode(&mut self, stems: &StemSet<Waveform>) -> Result<TokenTensor> {
        let aligned = align_stems(stems, self.sample_rate)?;
        let len = aligned.prompt.ncols();

        let prompt = waveform_tensor(&aligned.prompt)?;
        let vocal = waveform_tensor(&aligned.vocal)?;
        let bgm = waveform_tensor(&aligned.bgm)?;

        let session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (Cow::from("prompt"), SessionInputValue::from(prompt.view())),
            (Cow::from("vocal"), SessionInputValue::from(vocal.view())),
            (Cow::from("bgm"), SessionInputValue::from(bgm.view())),
        ];

        let mut outputs = self.session.run(session_inputs).map_err(|e| {
            SongGenError::generation_failed(format!("Prompt encoder inference failed: {}", e))
        })?;

        let codes = outputs
            .remove("codes")
            .ok_or_else(|| SongGenError::generation_failed("codes not found in output"))?;
        let (shape, data) = extract_i64(&codes, "codes")?;

        if shape.len() != 3 {
            return Err(SongGenError::generation_failed(format!(
                "Expected 3D prompt codes, got shape {:?}",
                shape
            )));
        }

        debug!(frames = shape[2], samples = len, "encoded reference prompt");

        Array3::from_shape_vec((shape[0], shape[1], shape[2]), data)
            .map_err(|e| SongGenError::generation_failed(format!("Failed to create array: {}", e)))
    }
}

/// Renders codes to audio.
pub struct CodecDecoder {
    mix: Session,
    separate: Session,
    config: ModelConfig,
}

impl CodecDecoder {
    /// Loads `codec_decoder.onnx` and `separate_decoder.onnx`.
    pub fn load(model_dir: &Path, config: ModelConfig, options: &SessionOptions) -> Result<Self> {
        let mix = load_session(&model_dir.join(CODEC_DECODER_FILE), options)?;
        let separate = load_session(&model_dir.join(SEPARATE_DECODER_FILE), options)?;
        Ok(Self {
            mix,
            separate,
            config,
        })
    }

    /// Decodes `tokens`, consuming them.
    ///
    /// `reference` holds the separated stems when conditioning on a clip.
    /// The mix decoder sees the reference mix; the separate decoder also sees
    /// the vocal and bgm stems. The output is cut to the length the codes
    /// cover.
    pub fn decode(
        &mut self,
        tokens: TokenSequence,
        reference: Option<&StemSet<Waveform>>,
        mode: SynthesisMode,
    ) -> Result<SynthesizedAudio> {
        let target_len = tokens.frames() * self.config.samples_per_frame();
        let codes = tokens.into_codes();
        let (batch, codebooks, frames) = codes.dim();

        let codes_value = Tensor::from_array((
            vec![batch, codebooks, frames],
            codes.iter().copied().collect::<Vec<i64>>(),
        ))
        .map_err(|e| SongGenError::generation_failed(format!("Failed to create codes tensor: {}", e)))?
        .into_dyn();

        let reference = reference_audio(reference, self.config.sample_rate)?;
        let prompt_value = waveform_tensor(&reference.prompt)?;

        let mut outputs = self
            .mix
            .run(vec![
                (Cow::from("codes"), SessionInputValue::from(codes_value.view())),
                (Cow::from("prompt_audio"), SessionInputValue::from(prompt_value.view())),
            ])
            .map_err(|e| SongGenError::generation_failed(format!("Codec inference failed: {}", e)))?;

        let audio = outputs
            .remove("audio")
            .ok_or_else(|| SongGenError::generation_failed("audio not found in output"))?;
        let mix = output_channels(&audio, "audio", target_len)?;

        let mut result = SynthesizedAudio::mixed(mix, self.config.sample_rate);

        if mode == SynthesisMode::Separate {
            let vocal_value = waveform_tensor(&reference.vocal)?;
            let bgm_value = waveform_tensor(&reference.bgm)?;
            let mut outputs = self
                .separate
                .run(vec![
                    (Cow::from("codes"), SessionInputValue::from(codes_value.view())),
                    (Cow::from("prompt_audio"), SessionInputValue::from(prompt_value.view())),
                    (Cow::from("vocal_audio"), SessionInputValue::from(vocal_value.view())),
                    (Cow::from("bgm_audio"), SessionInputValue::from(bgm_value.view())),
                ])
                .map_err(|e| {
                    SongGenError::generation_failed(format!("Separate decoder inference failed: {}", e))
                })?;

            for name in ["vocal", "bgm"] {
                let value = outputs.remove(name).ok_or_else(|| {
                    SongGenError::generation_failed(format!("{} not found in output", name))
                })?;
                let track = output_channels(&value, name, target_len)?;
                match name {
                    "vocal" => result.vocal = Some(track),
                    _ => result.bgm = Some(track),
                }
            }
        }

        Ok(result)
    }
}

/// Stereo at `sample_rate`.
fn prepare_waveform(wave: &Waveform, sample_rate: u32) -> Result<Waveform> {
    resample(&to_stereo(wave), sample_rate)
}

/// Stereo stems at `sample_rate`, cut to the shortest one.
fn align_stems(stems: &StemSet<Waveform>, sample_rate: u32) -> Result<StemSet<Array2<f32>>> {
    let prepared = stems.try_map(|wave| prepare_waveform(wave, sample_rate))?;
    let len = prepared.iter().map(Waveform::len).min().unwrap_or(0);
    if len == 0 {
        return Err(SongGenError::generation_failed("reference stems are empty"));
    }
    prepared.try_map(|wave| Ok(wave.samples.slice(s![.., ..len]).to_owned()))
}

/// Decoder reference inputs. One silent stereo sample per stem stands in for
/// "no reference".
fn reference_audio(
    reference: Option<&StemSet<Waveform>>,
    sample_rate: u32,
) -> Result<StemSet<Array2<f32>>> {
    match reference {
        Some(stems) => align_stems(stems, sample_rate),
        None => {
            let silent = || Array2::zeros((2, 1));
            Ok(StemSet::new(silent(), silent(), silent()))
        }
    }
}

/// Builds a `[1, channels, len]` tensor.
fn waveform_tensor(samples: &Array2<f32>) -> Result<DynValue> {
    let (channels, len) = samples.dim();
    let data: Vec<f32> = samples.iter().copied().collect();

    let tensor = Tensor::from_array((vec![1usize, channels, len], data)).map_err(|e| {
        SongGenError::generation_failed(format!("Failed to create audio tensor: {}", e))
    })?;
    Ok(tensor.into_dyn())
}

fn output_channels(value: &DynValue, name: &str, max_len: usize) -> Result<Array2<f32>> {
    let (shape, data) = extract_f32(value, name)?;
    to_channels(&shape, data, name, max_len)
}

/// Reshapes `[1, C, N]` or `[C, N]` output to `[C, min(N, max_len)]`.
fn to_channels(shape: &[usize], data: Vec<f32>, name: &str, max_len: usize) -> Result<Array2<f32>> {
    let dims = match shape {
        [1, channels, samples] => (*channels, *samples),
        [channels, samples] => (*channels, *samples),
        _ => {
            return Err(SongGenError::generation_failed(format!(
                "Unexpected {} shape {:?}",
                name, shape
            )))
        }
    };

    let audio = Array2::from_shape_vec(dims, data)
        .map_err(|e| SongGenError::generation_failed(format!("Failed to create array: {}", e)))?;

    if audio.ncols() > max_len {
        Ok(audio.slice(s![.., ..max_len]).to_owned())
    } else {
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn batched_output_is_trimmed() {
        let data: Vec<f32> = (0..12).map(|e| e as f32).collect();
        let audio = to_channels(&[1, 2, 6], data, "audio", 4).unwrap();
        assert_eq!(audio.dim(), (2, 4));
        assert_eq!(audio[[1, 0]], 6.0);
        assert_eq!(audio[[1, 3]], 9.0);
    }

    #[test]
    fn short_output_is_kept() {
        let audio = to_channels(&[2, 3], vec![0.0; 6], "audio", 100).unwrap();
        assert_eq!(audio.dim(), (2, 3));
    }

    #[test]
    fn unexpected_rank_rejected() {
        let err = to_channels(&[2, 1, 2, 3], vec![0.0; 12], "vocal", 10).unwrap_err();
        assert_eq!(err.code, ErrorCode::GenerationFailed);
        assert!(err.message.contains("vocal"));
    }

    #[test]
    fn reference_stems_cut_to_shortest() {
        let stems = StemSet::new(
            Waveform::new(Array2::from_elem((2, 480), 0.5), 48000),
            Waveform::new(Array2::from_elem((1, 400), 0.25), 48000),
            Waveform::new(Array2::from_elem((2, 440), 0.125), 48000),
        );
        let aligned = reference_audio(Some(&stems), 48000).unwrap();
        assert_eq!(aligned.prompt.dim(), (2, 400));
        assert_eq!(aligned.vocal.dim(), (2, 400));
        assert_eq!(aligned.bgm.dim(), (2, 400));
        assert_eq!(aligned.vocal[[1, 0]], 0.25);
        assert_eq!(aligned.bgm[[0, 399]], 0.125);
    }

    #[test]
    fn missing_reference_is_silent() {
        let reference = reference_audio(None, 48000).unwrap();
        for stem in reference.iter() {
            assert_eq!(stem.dim(), (2, 1));
            assert_eq!(stem[[0, 0]], 0.0);
        }
    }

    #[test]
    fn empty_reference_rejected() {
        let empty = Waveform::new(Array2::zeros((2, 0)), 48000);
        let stems = StemSet::new(empty.clone(), empty.clone(), empty);
        let err = reference_audio(Some(&stems), 48000).unwrap_err();
        assert_eq!(err.code, ErrorCode::GenerationFailed);
    }

    #[test]
    fn stems_prepared_as_stereo() {
        let mono = Waveform::new(Array2::from_elem((1, 480), 0.25), 48000);
        let wave = prepare_waveform(&mono, 48000).unwrap();
        assert_eq!(wave.channels(), 2);
        assert_eq!(wave.len(), 480);
    }
}
