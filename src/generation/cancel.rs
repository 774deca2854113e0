//! Cooperative cancellation between pipeline stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SongGenError};

/// Shared flag checked by the pipeline between stages.
///
/// Clones share the flag, so a token handed to a running job can be
/// tripped from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `CANCELLED` if cancellation was requested before `stage`.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(SongGenError::cancelled(stage))
        } else {
            Ok(())
        }
    }
}
