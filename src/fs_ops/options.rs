//! Creation options: retry budget and entropy source.

use std::path::Path;
use std::sync::Arc;

use super::dir::TemporaryDirectory;
use super::file::TemporaryFile;
use super::tmpname::{EntropySource, OsEntropy};
use crate::config::DEFAULT_RETRY_BUDGET;
use crate::errors::Result;

/// Knobs shared by [`TemporaryFile`] and [`TemporaryDirectory`] creation.
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) retry_budget: u32,
    pub(crate) entropy: Arc<dyn EntropySource>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            entropy: Arc::new(OsEntropy),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum attempts to claim a temporary name (creation and directory
    /// swap-aside). Clamped to at least 1.
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    pub fn entropy(mut self, source: impl EntropySource + 'static) -> Self {
        self.entropy = Arc::new(source);
        self
    }

    /// Use an already shared entropy source.
    pub fn shared_entropy(mut self, source: Arc<dyn EntropySource>) -> Self {
        self.entropy = source;
        self
    }

    pub fn create_file(&self, path: impl AsRef<Path>, mode: u32) -> Result<TemporaryFile> {
        TemporaryFile::create(self, path.as_ref(), mode)
    }

    pub fn create_dir(&self, path: impl AsRef<Path>, mode: u32) -> Result<TemporaryDirectory> {
        TemporaryDirectory::create(self, path.as_ref(), mode)
    }
}

/// Create a temporary file beside `path` with default options.
pub fn create_file(path: impl AsRef<Path>, mode: u32) -> Result<TemporaryFile> {
    Options::default().create_file(path, mode)
}

/// Create a temporary directory beside `path` with default options.
pub fn create_dir(path: impl AsRef<Path>, mode: u32) -> Result<TemporaryDirectory> {
    Options::default().create_dir(path, mode)
}
