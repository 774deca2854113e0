//! Prompt bundle storage.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;

use super::bundle::PromptBundle;

/// Loads prompt bundles by path.
///
/// Implementations must tolerate concurrent reads from many requests.
pub trait PromptStore: Send + Sync {
    /// Loads the bundle at `path`.
    ///
    /// Fails with BUNDLE_LOAD_FAILED when the path is missing or malformed.
    fn load_bundle(&self, path: &Path) -> Result<Arc<PromptBundle>>;
}

/// Reads bundles from disk on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePromptStore;

impl FilePromptStore {
    pub fn new() -> Self {
        Self
    }
}

impl PromptStore for FilePromptStore {
    fn load_bundle(&self, path: &Path) -> Result<Arc<PromptBundle>> {
        debug!(path = %path.display(), "loading prompt bundle");
        PromptBundle::from_file(path).map(Arc::new)
    }
}

impl<T: PromptStore + ?Sized> PromptStore for Arc<T> {
    fn load_bundle(&self, path: &Path) -> Result<Arc<PromptBundle>> {
        (**self).load_bundle(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::Genre;
    use std::io::Write;

    #[test]
    fn file_store_reads_bundle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Rock": [{{"shape": [1, 3, 1], "data": [1, 2, 3]}}]}}"#
        )
        .unwrap();

        let bundle = FilePromptStore::new().load_bundle(file.path()).unwrap();
        assert_eq!(bundle.candidates(Genre::Rock, None).unwrap().len(), 1);
    }

    #[test]
    fn file_store_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FilePromptStore::new()
            .load_bundle(&dir.path().join("missing.json"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BundleLoadFailed);
    }
}
