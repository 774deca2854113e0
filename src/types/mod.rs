//! Core types for songgen.
//!
//! This module re-exports the data types shared across the crate:
//! - [`GenerationRequest`]: A song request with its conditioning inputs
//! - [`GenerationParameters`]: Sampling parameters and the override merge
//! - [`Waveform`], [`StemSet`], [`TokenSequence`], [`SynthesizedAudio`]: Stage buffers
//! - [`ModelConfig`]: Configuration parameters for the song model
//! - [`SongRecord`]: Metadata of a song written to disk

mod audio;
mod config;
pub mod params;
mod request;
mod song;

pub use audio::{StemSet, SynthesizedAudio, TokenSequence, TokenTensor, Waveform};
pub use config::ModelConfig;
pub use params::{merge, GenerationParameters, ParamOverrides, ParamValue, MAX_DURATION_SEC};
pub use request::{GenerationMode, GenerationRequest, Genre, SynthesisMode};
pub use song::{compute_song_id, SongRecord};
