//! Reference audio decoding.
//!
//! Reads wav, mp3 and flac files into `[channels, samples]` waveforms with
//! symphonia.

use std::fs::File;
use std::path::Path;

use ndarray::{s, Array2, Axis};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::error::{Result, SongGenError};
use crate::types::Waveform;

/// Decodes an audio file into a waveform at its native sample rate.
pub fn read_audio(path: &Path) -> Result<Waveform> {
    let file = File::open(path).map_err(|e| {
        SongGenError::audio_io_failed(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            SongGenError::audio_io_failed(format!("Unsupported audio {}: {}", path.display(), e))
        })?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| SongGenError::audio_io_failed(format!("No audio track in {}", path.display())))?;
    let track_id = track.id;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SongGenError::audio_io_failed(format!("No decoder for {}: {}", path.display(), e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = 0;
    let mut channels: usize = 0;

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frame, keep going.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => {
                return Err(SongGenError::audio_io_failed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    if channels == 0 || sample_rate == 0 {
        return Err(SongGenError::audio_io_failed(format!(
            "No audio decoded from {}",
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        frames = interleaved.len() / channels,
        "decoded reference audio"
    );

    let frames = interleaved.len() / channels;
    interleaved.truncate(frames * channels);
    let samples = Array2::from_shape_vec((frames, channels), interleaved)
        .map_err(|e| SongGenError::audio_io_failed(e.to_string()))?
        .reversed_axes()
        .as_standard_layout()
        .into_owned();

    Ok(Waveform::new(samples, sample_rate))
}

/// Converts a waveform to two channels.
///
/// Mono is duplicated; extra channels are averaged into the second one.
pub fn to_stereo(wave: &Waveform) -> Waveform {
    let samples = match wave.channels() {
        2 => wave.samples.clone(),
        0 => Array2::zeros((2, 0)),
        1 => {
            let mono = wave.samples.row(0);
            ndarray::stack(Axis(0), &[mono, mono]).unwrap_or_else(|_| Array2::zeros((2, 0)))
        }
        n => {
            let mut stereo = Array2::zeros((2, wave.len()));
            stereo.row_mut(0).assign(&wave.samples.row(0));
            let rest = wave.samples.slice(s![1..n, ..]);
            if let Some(mean) = rest.mean_axis(Axis(0)) {
                stereo.row_mut(1).assign(&mean);
            }
            stereo
        }
    };
    Waveform::new(samples, wave.sample_rate)
}
