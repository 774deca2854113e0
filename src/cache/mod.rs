//! Cache module for prompt bundle storage.
//!
//! Provides LRU-based caching of parsed prompt bundles.

pub mod bundles;

pub use bundles::CachedPromptStore;
