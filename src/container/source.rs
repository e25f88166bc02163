//! Byte sources for raw container buffers
//!
//! Network retrieval lives outside this crate; anything that can turn a
//! locator into bytes can implement [`ContainerSource`].

use std::fs;
use std::path::PathBuf;

use crate::error::{CcmzError, Result};

/// Supplies the raw container buffer for a source locator
pub trait ContainerSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}

/// Reads containers from the local filesystem, relative to an optional root
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locators against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(locator),
            None => PathBuf::from(locator),
        }
    }
}

impl ContainerSource for FileSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let path = self.resolve(locator);
        let data = fs::read(&path)?;

        if data.is_empty() {
            return Err(CcmzError::Format(format!(
                "Container file '{}' is empty",
                path.display()
            )));
        }

        log::debug!("Fetched {} bytes from {}", data.len(), path.display());
        Ok(data)
    }
}
