//! Audio resampling using rubato.

use ndarray::{s, Array2};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{Result, SongGenError};
use crate::types::Waveform;

/// Input frames fed to the resampler per call.
const CHUNK_SIZE: usize = 1024;

/// Resamples every channel of `wave` to `target_rate`.
///
/// The output has `round(len * target_rate / sample_rate)` samples per
/// channel, with the resampler's delay removed.
pub fn resample(wave: &Waveform, target_rate: u32) -> Result<Waveform> {
    if wave.sample_rate == target_rate {
        return Ok(wave.clone());
    }
    if wave.sample_rate == 0 || target_rate == 0 {
        return Err(SongGenError::audio_io_failed(format!(
            "cannot resample {} Hz to {} Hz",
            wave.sample_rate, target_rate
        )));
    }

    let channels = wave.channels();
    let len = wave.len();
    let ratio = target_rate as f64 / wave.sample_rate as f64;
    let expected = (len as f64 * ratio).round() as usize;

    if channels == 0 || len == 0 {
        return Ok(Waveform::new(Array2::zeros((channels, 0)), target_rate));
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, channels)
        .map_err(|e| SongGenError::audio_io_failed(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];
    let mut pos = 0;

    while output[0].len() < expected + delay {
        // Pad the last chunks with silence so the delayed tail is flushed.
        let input: Vec<Vec<f32>> = (0..channels)
            .map(|c| {
                let mut chunk = if pos < len {
                    let end = (pos + CHUNK_SIZE).min(len);
                    wave.samples.slice(s![c, pos..end]).to_vec()
                } else {
                    Vec::new()
                };
                chunk.resize(CHUNK_SIZE, 0.0);
                chunk
            })
            .collect();

        let result = resampler
            .process(&input, None)
            .map_err(|e| SongGenError::audio_io_failed(format!("Resampling failed: {}", e)))?;

        for (channel, data) in output.iter_mut().zip(result) {
            channel.extend_from_slice(&data);
        }

        pos += CHUNK_SIZE;
    }

    let flat: Vec<f32> = output
        .iter()
        .flat_map(|channel| channel[delay..delay + expected].iter().copied())
        .collect();
    let samples = Array2::from_shape_vec((channels, expected), flat)
        .map_err(|e| SongGenError::audio_io_failed(e.to_string()))?;

    Ok(Waveform::new(samples, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(rate: u32, seconds: f32, freq: f32) -> Waveform {
        let n = (rate as f32 * seconds) as usize;
        let samples = Array2::from_shape_fn((2, n), |(_, i)| {
            (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5
        });
        Waveform::new(samples, rate)
    }

    #[test]
    fn same_rate_is_identity() {
        let wave = sine(48000, 0.1, 440.0);
        assert_eq!(resample(&wave, 48000).unwrap(), wave);
    }

    #[test]
    fn upsampling_scales_length() {
        let wave = sine(16000, 0.5, 440.0);
        let out = resample(&wave, 48000).unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.channels(), 2);
        assert_eq!(out.len(), 24000);
    }

    #[test]
    fn downsampling_keeps_energy() {
        let wave = sine(44100, 0.5, 220.0);
        let out = resample(&wave, 22050).unwrap();
        assert_eq!(out.len(), 11025);

        let peak = out.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6, "peak {}", peak);
    }

    #[test]
    fn empty_input() {
        let wave = Waveform::new(Array2::zeros((2, 0)), 16000);
        let out = resample(&wave, 48000).unwrap();
        assert!(out.is_empty());
    }
}
