//! Vocal/accompaniment separation of reference clips.

use std::borrow::Cow;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use ndarray::{s, Array2};
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::audio::{read_audio, resample, to_stereo};
use crate::error::{Result, SongGenError};
use crate::types::{StemSet, Waveform};

use super::session::{extract_f32, load_session, SessionOptions};
use super::SourceSeparator;

/// Rate the separation network runs at.
pub const SEPARATOR_SAMPLE_RATE: u32 = 48000;

/// Only the start of a reference clip is used.
pub const MAX_REFERENCE_SECONDS: f32 = 10.0;

/// ONNX separation network (`separator.onnx`).
///
/// Input `mixture` is `[1, 2, T]`, output `vocals` has the same shape. The
/// prompt stem is the mixture itself and the accompaniment is what remains
/// after removing the vocals.
pub struct OnnxSeparator {
    session: Mutex<Session>,
}

impl OnnxSeparator {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let session = load_session(path, options)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn run(&self, mixture: &Array2<f32>) -> Result<Array2<f32>> {
        let (channels, len) = mixture.dim();
        let input = Tensor::from_array((
            vec![1usize, channels, len],
            mixture.iter().copied().collect::<Vec<f32>>(),
        ))
        .map_err(|e| SongGenError::separation_failed(format!("Failed to create mixture tensor: {}", e)))?
        .into_dyn();

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let mut outputs = session
            .run(vec![(
                Cow::from("mixture"),
                SessionInputValue::from(input.view()),
            )])
            .map_err(|e| SongGenError::separation_failed(format!("Separator inference failed: {}", e)))?;

        let vocals = outputs
            .remove("vocals")
            .ok_or_else(|| SongGenError::separation_failed("vocals not found in output"))?;
        let (shape, data) =
            extract_f32(&vocals, "vocals").map_err(|e| SongGenError::separation_failed(e.message))?;

        let dims = match shape.as_slice() {
            [1, c, n] | [c, n] => (*c, *n),
            _ => {
                return Err(SongGenError::separation_failed(format!(
                    "Unexpected vocals shape {:?}",
                    shape
                )))
            }
        };
        Array2::from_shape_vec(dims, data).map_err(|e| SongGenError::separation_failed(e.to_string()))
    }
}

impl SourceSeparator for OnnxSeparator {
    fn separate(&self, path: &Path) -> Result<StemSet<Waveform>> {
        let start = Instant::now();
        let wrap = |e: SongGenError| {
            SongGenError::separation_failed(format!("{}: {}", path.display(), e.message))
        };

        let wave = read_audio(path).map_err(wrap)?;
        let mixture = prepare_mixture(&wave).map_err(wrap)?;

        if mixture.ncols() == 0 {
            return Err(SongGenError::separation_failed(format!(
                "{}: reference clip is empty",
                path.display()
            )));
        }

        debug!(samples = mixture.ncols(), "separating reference clip");
        let vocals = self.run(&mixture)?;
        let stems = split_stems(mixture, vocals, SEPARATOR_SAMPLE_RATE)?;

        info!(
            path = %path.display(),
            duration_sec = stems.prompt.duration_sec(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "separated reference clip"
        );
        Ok(stems)
    }
}

/// Separator used when no separation model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSeparator;

impl SourceSeparator for UnavailableSeparator {
    fn separate(&self, _path: &Path) -> Result<StemSet<Waveform>> {
        Err(SongGenError::separation_failed("no separator model configured"))
    }
}

/// Stereo mixture at the separator rate, at most `MAX_REFERENCE_SECONDS` long.
///
/// The clip is cropped at its own rate first so only the kept part is
/// resampled.
fn prepare_mixture(wave: &Waveform) -> Result<Array2<f32>> {
    let cropped = crop_reference(wave, MAX_REFERENCE_SECONDS);
    let stereo = resample(&to_stereo(&cropped), SEPARATOR_SAMPLE_RATE)?;
    Ok(crop_reference(&stereo, MAX_REFERENCE_SECONDS).samples)
}

/// Keeps the first `seconds` of `wave`.
fn crop_reference(wave: &Waveform, seconds: f32) -> Waveform {
    let max_len = (seconds * wave.sample_rate as f32) as usize;
    let len = wave.len().min(max_len);
    Waveform::new(wave.samples.slice(s![.., ..len]).to_owned(), wave.sample_rate)
}

/// Builds prompt (the mixture), vocal and bgm (mixture minus vocals) stems.
fn split_stems(mixture: Array2<f32>, vocals: Array2<f32>, sample_rate: u32) -> Result<StemSet<Waveform>> {
    let (channels, len) = mixture.dim();
    if vocals.nrows() != channels || vocals.ncols() < len {
        return Err(SongGenError::separation_failed(format!(
            "vocals shape {:?} does not cover mixture shape {:?}",
            vocals.dim(),
            mixture.dim()
        )));
    }

    let vocals = vocals.slice(s![.., ..len]).to_owned();
    let bgm = &mixture - &vocals;

    Ok(StemSet::new(
        Waveform::new(mixture, sample_rate),
        Waveform::new(vocals, sample_rate),
        Waveform::new(bgm, sample_rate),
    ))
}
