//! songgen: lyrics-to-song generation on ONNX Runtime.
//!
//! The core of the crate is the conditioning orchestrator: for each request
//! it chooses what the song model is conditioned on (separated stems of a
//! reference clip, a precomputed genre prompt, or nothing), merges per-call
//! parameter overrides with the defaults, and drives token generation and
//! synthesis.
//!
//! # Modules
//!
//! - [`types`]: Core data types (GenerationRequest, GenerationParameters, SongRecord)
//! - [`conditioning`]: Language detection, prompt bundles, conditioning selection
//! - [`models`]: Model traits and their ONNX implementations
//! - [`generation`]: Pipeline driver and cancellation
//! - [`audio`]: Decoding, resampling and WAV output
//! - [`cache`]: Prompt bundle cache
//! - [`config`]: Runtime configuration (SongGenConfig, Device)
//! - [`error`]: Error types and codes (SongGenError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use songgen::{
//!     cache::CachedPromptStore,
//!     conditioning::FilePromptStore,
//!     generation::SongPipeline,
//!     models::{OnnxSongModel, SessionOptions, UnavailableSeparator},
//!     types::{GenerationParameters, GenerationRequest},
//! };
//!
//! let model = OnnxSongModel::load("models/song".as_ref(), &SessionOptions::default())?;
//! let defaults = GenerationParameters::defaults_for(model.config());
//! let pipeline = SongPipeline::new(
//!     model,
//!     UnavailableSeparator,
//!     CachedPromptStore::new(FilePromptStore::new()),
//!     defaults,
//! );
//!
//! let request = GenerationRequest::new("[verse] city lights are calling")
//!     .with_genre("Pop", "prompts/bundle.json")
//!     .with_seed(42);
//! let song = pipeline.generate(&request)?;
//! ```

pub mod audio;
pub mod cache;
pub mod cli;
pub mod conditioning;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::{Device, SongGenConfig};
pub use error::{ErrorCode, ErrorKind, Result, SongGenError};
pub use generation::{CancelToken, SongOutput, SongPipeline};
pub use types::{GenerationMode, GenerationParameters, GenerationRequest, Genre, SynthesizedAudio};
