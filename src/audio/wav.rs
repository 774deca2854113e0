//! WAV file writer for audio output.
//!
//! Writes `[channels, samples]` buffers to WAV format using the hound crate.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array2, Axis};

use crate::error::{Result, SongGenError};
use crate::types::SynthesizedAudio;

/// Bits per sample of written files (32-bit float).
pub const BITS_PER_SAMPLE: u16 = 32;

/// Writes a `[channels, samples]` buffer to a WAV file.
///
/// Channels are interleaved frame by frame.
pub fn write_wav(samples: &Array2<f32>, path: &Path, sample_rate: u32) -> Result<()> {
    let channels = samples.len_of(Axis(0));
    if channels == 0 || channels > u16::MAX as usize {
        return Err(SongGenError::audio_io_failed(format!(
            "cannot write {} channels to {}",
            channels,
            path.display()
        )));
    }

    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| {
        SongGenError::audio_io_failed(format!("Failed to create {}: {}", path.display(), e))
    })?;

    for frame in samples.axis_iter(Axis(1)) {
        for sample in frame.iter() {
            writer.write_sample(*sample).map_err(|e| {
                SongGenError::audio_io_failed(format!("Failed to write sample: {}", e))
            })?;
        }
    }

    writer.finalize().map_err(|e| {
        SongGenError::audio_io_failed(format!("Failed to finalize {}: {}", path.display(), e))
    })?;

    Ok(())
}

/// Writes every stem of a song into `dir`.
///
/// The mix goes to `<song_id>.wav`, stems to `<song_id>_<stem>.wav`.
/// Returns the written paths keyed by stem name.
pub fn write_song(audio: &SynthesizedAudio, dir: &Path, song_id: &str) -> Result<Vec<(String, PathBuf)>> {
    std::fs::create_dir_all(dir).map_err(|e| {
        SongGenError::audio_io_failed(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let mut written = Vec::new();
    for (name, samples) in audio.stems() {
        let file_name = if name == "mix" {
            format!("{}.wav", song_id)
        } else {
            format!("{}_{}.wav", song_id, name)
        };
        let path = dir.join(file_name);
        write_wav(samples, &path, audio.sample_rate)?;
        written.push((name.to_string(), path));
    }

    Ok(written)
}

/// Calculates the duration of audio in seconds from sample count.
pub fn samples_to_duration(sample_count: usize, sample_rate: u32) -> f32 {
    sample_count as f32 / sample_rate as f32
}
