//! In-memory audio and token buffers passed between pipeline stages.

use ndarray::{Array2, Array3, Axis};

/// Discrete prompt tokens, shaped `[batch, channel, frames]`.
pub type TokenTensor = Array3<i64>;

/// Raw audio, shaped `[channels, samples]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Array2<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.samples.len_of(Axis(1))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds.
    pub fn duration_sec(&self) -> f32 {
        self.len() as f32 / self.sample_rate.max(1) as f32
    }
}

/// The three conditioning channels, always populated together.
#[derive(Debug, Clone, PartialEq)]
pub struct StemSet<T> {
    /// Full reference mix / accompaniment prompt.
    pub prompt: T,
    /// Isolated vocals.
    pub vocal: T,
    /// Isolated background music.
    pub bgm: T,
}

impl<T> StemSet<T> {
    pub fn new(prompt: T, vocal: T, bgm: T) -> Self {
        Self { prompt, vocal, bgm }
    }

    /// Applies `f` to each stem in prompt, vocal, bgm order.
    pub fn try_map<U, E>(&self, mut f: impl FnMut(&T) -> Result<U, E>) -> Result<StemSet<U>, E> {
        Ok(StemSet {
            prompt: f(&self.prompt)?,
            vocal: f(&self.vocal)?,
            bgm: f(&self.bgm)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.prompt, &self.vocal, &self.bgm].into_iter()
    }
}

/// Codes produced by token generation and consumed by synthesis.
///
/// Deliberately not `Clone`: a sequence moves from the generation phase into
/// the synthesis phase of one request and is dropped with it.
#[derive(Debug, PartialEq)]
pub struct TokenSequence {
    codes: Array3<i64>,
}

impl TokenSequence {
    /// Wraps `[1, codebooks, frames]` codes.
    pub fn new(codes: Array3<i64>) -> Self {
        Self { codes }
    }

    pub fn codes(&self) -> &Array3<i64> {
        &self.codes
    }

    pub fn into_codes(self) -> Array3<i64> {
        self.codes
    }

    /// Number of token frames.
    pub fn frames(&self) -> usize {
        self.codes.len_of(Axis(2))
    }
}

/// Final output of a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub sample_rate: u32,
    /// Full mix, `[channels, samples]`.
    pub mix: Array2<f32>,
    /// Isolated vocals, present in separate mode.
    pub vocal: Option<Array2<f32>>,
    /// Isolated accompaniment, present in separate mode.
    pub bgm: Option<Array2<f32>>,
}

impl SynthesizedAudio {
    /// Creates a mix-only result.
    pub fn mixed(mix: Array2<f32>, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            mix,
            vocal: None,
            bgm: None,
        }
    }

    /// Returns each present stem with its name, mix first.
    pub fn stems(&self) -> Vec<(&'static str, &Array2<f32>)> {
        let mut stems = vec![("mix", &self.mix)];
        if let Some(vocal) = &self.vocal {
            stems.push(("vocal", vocal));
        }
        if let Some(bgm) = &self.bgm {
            stems.push(("bgm", bgm));
        }
        stems
    }

    /// Duration of the mix in seconds.
    pub fn duration_sec(&self) -> f32 {
        self.mix.len_of(Axis(1)) as f32 / self.sample_rate.max(1) as f32
    }
}
