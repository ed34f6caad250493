//! Bounded access to a zip-packaged PBIX file
//!
//! Opening validates that the input is a zip archive and that it does not
//! declare more entries than allowed. Individual reads are checked against
//! per-entry and running-total uncompressed size limits.

use crate::error::PbixError;
use pbischema_core::PbixConfig;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Size limits applied while reading a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLimits {
    pub max_entries: usize,
    pub max_entry_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self::from(&PbixConfig::default())
    }
}

impl From<&PbixConfig> for PackageLimits {
    fn from(config: &PbixConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            max_entry_bytes: config.max_entry_bytes,
            max_total_bytes: config.max_total_bytes,
        }
    }
}

pub(crate) trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// An opened PBIX package
pub struct PbixPackage {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    limits: PackageLimits,
    total_read: u64,
}

impl std::fmt::Debug for PbixPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbixPackage")
            .field("entries", &self.archive.len())
            .field("limits", &self.limits)
            .field("total_read", &self.total_read)
            .finish()
    }
}

impl PbixPackage {
    /// Open a package file
    pub fn open(path: impl AsRef<Path>, limits: PackageLimits) -> Result<Self, PbixError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, limits)
    }

    /// Open a package held in memory
    pub fn from_bytes(bytes: Vec<u8>, limits: PackageLimits) -> Result<Self, PbixError> {
        Self::from_reader(Cursor::new(bytes), limits)
    }

    /// Open a package from any seekable reader
    pub fn from_reader<R: Read + Seek + 'static>(
        reader: R,
        limits: PackageLimits,
    ) -> Result<Self, PbixError> {
        let reader: Box<dyn ReadSeek> = Box::new(reader);
        let archive = ZipArchive::new(reader).map_err(|err| match err {
            ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
                PbixError::NotZipContainer
            }
            ZipError::Io(e) => PbixError::Io(e),
            other => PbixError::Zip(other.to_string()),
        })?;

        if archive.len() > limits.max_entries {
            return Err(PbixError::TooManyEntries {
                entries: archive.len(),
                max_entries: limits.max_entries,
            });
        }

        Ok(Self {
            archive,
            limits,
            total_read: 0,
        })
    }

    /// Entry names in archive order
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// First entry whose name contains `marker`
    pub fn find_entry_containing(&self, marker: &str) -> Option<String> {
        self.archive
            .file_names()
            .find(|name| name.contains(marker))
            .map(str::to_string)
    }

    /// True when an entry with exactly this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Read an entry, enforcing the size limits
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, PbixError> {
        let size = {
            let file = self.archive.by_name(name).map_err(|e| match e {
                ZipError::FileNotFound => PbixError::EntryNotFound(name.to_string()),
                other => PbixError::EntryRead {
                    path: name.to_string(),
                    reason: other.to_string(),
                },
            })?;
            file.size()
        };

        if size > self.limits.max_entry_bytes {
            return Err(PbixError::EntryTooLarge {
                path: name.to_string(),
                size,
                limit: self.limits.max_entry_bytes,
            });
        }

        let new_total = self.total_read.saturating_add(size);
        if new_total > self.limits.max_total_bytes {
            return Err(PbixError::TotalTooLarge {
                limit: self.limits.max_total_bytes,
            });
        }

        let mut file = self.archive.by_name(name).map_err(|e| PbixError::EntryRead {
            path: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| PbixError::EntryRead {
            path: name.to_string(),
            reason: e.to_string(),
        })?;

        self.total_read = new_total;
        Ok(buf)
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limits(&self) -> &PackageLimits {
        &self.limits
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Build an in-memory zip from (name, bytes) pairs
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}
