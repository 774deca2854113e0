//! Conditioning selection for song generation.
//!
//! - [`language`]: lyric language classification
//! - [`bundle`]: precomputed genre prompt bundles
//! - [`store`]: bundle loading behind the [`PromptStore`] trait
//! - [`selector`]: picks reference audio, genre prompt or no conditioning

pub mod bundle;
pub mod language;
pub mod selector;
pub mod store;

pub use bundle::PromptBundle;
pub use language::{detect_language, Language};
pub use selector::{Conditioning, ConditioningSelector, ConditioningSource};
pub use store::{FilePromptStore, PromptStore};
