//! Song generation module.
//!
//! Provides the generation pipeline, and cancellation.

pub mod cancel;
pub mod pipeline;

// Re-export commonly used items
pub use cancel::CancelToken;
pub use pipeline::{normalize_lyrics, prefixed_description, SongOutput, SongPipeline, Stage};
