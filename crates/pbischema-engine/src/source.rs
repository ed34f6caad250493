//! Extraction inputs

use pbischema_core::SourceKind;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Where a schema is extracted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A TMDL project directory on disk
    TmdlDirectory(PathBuf),

    /// Uploaded TMDL files keyed by their path relative to the project root
    TmdlFiles(BTreeMap<String, Vec<u8>>),

    /// A PBIX file on disk
    PbixFile(PathBuf),

    /// A PBIX package held in memory
    PbixBytes(Vec<u8>),
}

impl SchemaSource {
    /// Source kind, which is also the snapshot id prefix
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::TmdlDirectory(_) | Self::TmdlFiles(_) => SourceKind::Tmdl,
            Self::PbixFile(_) | Self::PbixBytes(_) => SourceKind::Pbix,
        }
    }
}

/// Write uploaded files into a fresh temporary directory
///
/// The directory is removed when the returned guard is dropped. Paths that
/// are absolute or step outside the root are skipped.
pub fn materialize_files(files: &BTreeMap<String, Vec<u8>>) -> std::io::Result<TempDir> {
    let workspace = TempDir::new()?;

    for (name, contents) in files {
        let relative = Path::new(name);
        if !is_contained(relative) {
            warn!("Skipping uploaded file outside the project root: {}", name);
            continue;
        }

        let target = workspace.path().join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, contents)?;
        debug!("Wrote {} ({} bytes)", target.display(), contents.len());
    }

    Ok(workspace)
}

fn is_contained(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some()
        && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
