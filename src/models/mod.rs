//! Song model components.
//!
//! The pipeline talks to its collaborators through two traits:
//! - [`SongModel`]: token generation and audio synthesis
//! - [`SourceSeparator`]: reference clip to conditioning stems
//!
//! ONNX Runtime implementations of both live in the submodules:
//! - [`OnnxSongModel`](song_model::OnnxSongModel): language model, prompt encoder and codec
//! - [`OnnxSeparator`](separator::OnnxSeparator): vocal/accompaniment separation
//! - [`Logits`](logits::Logits): guidance and sampling

use std::path::Path;
use std::sync::Arc;

use crate::conditioning::Conditioning;
use crate::error::Result;
use crate::types::{
    GenerationParameters, StemSet, SynthesisMode, SynthesizedAudio, TokenSequence, Waveform,
};

pub mod codec;
pub mod lm;
pub mod loader;
pub mod logits;
pub mod separator;
pub mod session;
pub mod song_model;

// Re-export commonly used types
pub use loader::{check_models, load_model_config, OPTIONAL_MODEL_FILES, REQUIRED_MODEL_FILES};
pub use logits::{Logits, SamplingParams};
pub use separator::{OnnxSeparator, UnavailableSeparator};
pub use session::SessionOptions;
pub use song_model::OnnxSongModel;

/// Numeric precision a model phase runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Half precision, used for token generation.
    Half,
    /// Full precision, used for synthesis.
    Full,
}

/// Everything token generation consumes for one request.
#[derive(Debug, Clone, Copy)]
pub struct TokenInput<'a> {
    /// Whitespace-normalized lyrics.
    pub lyrics: &'a str,
    /// Prefixed style description.
    pub description: &'a str,
    pub conditioning: &'a Conditioning,
    /// Sampling seed.
    pub seed: u64,
}

/// Splits a reference clip into prompt, vocal and accompaniment stems.
pub trait SourceSeparator: Send + Sync {
    /// Separates the clip at `path`.
    ///
    /// Fails with `SEPARATION_FAILED` when the clip cannot be read or separated.
    fn separate(&self, path: &Path) -> Result<StemSet<Waveform>>;
}

impl<T: SourceSeparator + ?Sized> SourceSeparator for Arc<T> {
    fn separate(&self, path: &Path) -> Result<StemSet<Waveform>> {
        (**self).separate(path)
    }
}

impl<T: SourceSeparator + ?Sized> SourceSeparator for Box<T> {
    fn separate(&self, path: &Path) -> Result<StemSet<Waveform>> {
        (**self).separate(path)
    }
}

/// Pretrained song model: lyrics and conditioning to tokens, tokens to audio.
///
/// Configuration set by [`configure`](SongModel::configure) persists on the
/// instance until the next call.
pub trait SongModel: Send {
    /// Applies generation parameters to subsequent calls.
    fn configure(&mut self, params: &GenerationParameters) -> Result<()>;

    /// Phase A: generates the token sequence of one song.
    fn generate_tokens(&mut self, input: &TokenInput<'_>, precision: Precision) -> Result<TokenSequence>;

    /// Phase B: renders tokens to audio.
    ///
    /// `stems` is present only for waveform conditioning.
    fn synthesize(
        &mut self,
        tokens: TokenSequence,
        stems: Option<&StemSet<Waveform>>,
        mode: SynthesisMode,
        precision: Precision,
    ) -> Result<SynthesizedAudio>;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Longest song the model produces, in seconds.
    fn max_duration(&self) -> f32;
}

impl<T: SongModel + ?Sized> SongModel for Box<T> {
    fn configure(&mut self, params: &GenerationParameters) -> Result<()> {
        (**self).configure(params)
    }

    fn generate_tokens(&mut self, input: &TokenInput<'_>, precision: Precision) -> Result<TokenSequence> {
        (**self).generate_tokens(input, precision)
    }

    fn synthesize(
        &mut self,
        tokens: TokenSequence,
        stems: Option<&StemSet<Waveform>>,
        mode: SynthesisMode,
        precision: Precision,
    ) -> Result<SynthesizedAudio> {
        (**self).synthesize(tokens, stems, mode, precision)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn max_duration(&self) -> f32 {
        (**self).max_duration()
    }
}
