//! Named-member extraction from the zip archive inside a container payload

use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{CcmzError, Result};

/// Normalize zip entry path to use forward slashes (zip standard)
fn normalize_zip_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Read-only view over an in-memory zip archive
pub struct Archive<'a> {
    inner: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Archive<'a> {
    /// Open an archive from raw bytes
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let inner = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CcmzError::Container(format!("Failed to read zip archive: {}", e)))?;
        Ok(Self { inner })
    }

    /// Member names in archive order, with separators normalized
    pub fn member_names(&self) -> Vec<String> {
        self.inner.file_names().map(normalize_zip_path).collect()
    }

    /// Read a member's raw bytes
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        if self.inner.index_for_name(name).is_none() {
            return Err(CcmzError::Container(format!(
                "Archive is missing required member '{}' (found: {})",
                name,
                self.member_names().join(", ")
            )));
        }

        let mut entry = self.inner.by_name(name).map_err(|e| {
            CcmzError::Container(format!("Failed to read zip entry '{}': {}", name, e))
        })?;

        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buffer)
            .map_err(|e| CcmzError::Container(format!("Failed to extract '{}': {}", name, e)))?;
        Ok(buffer)
    }

    /// Read a member that must be UTF-8 text
    pub fn read_text(&mut self, name: &str) -> Result<String> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes)
            .map_err(|e| CcmzError::Container(format!("Member '{}' is not valid UTF-8: {}", name, e)))
    }
}
