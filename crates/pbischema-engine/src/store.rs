//! Append-only snapshot store
//!
//! One pretty-printed JSON document per snapshot, named `<id>.json` inside
//! the data directory. Ids are `<kind>_<YYYYMMDDHHMMSS>`, with a `-<n>`
//! suffix when several snapshots are taken within the same second. Files are
//! created with create-new semantics, so an existing snapshot is never
//! overwritten.

use chrono::NaiveDateTime;
use pbischema_core::{Schema, SourceKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info, warn};

const SNAPSHOT_EXTENSION: &str = "json";
const ID_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reported creation time for ids that carry no parseable timestamp
pub const UNKNOWN_CREATED_AT: &str = "unknown";

static SNAPSHOT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(tmdl|pbix)_(\d{14})(?:-(\d+))?$").unwrap());

/// Listing entry for a persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub id: String,

    /// `YYYY-MM-DD HH:MM:SS`, or `unknown`
    pub created_at: String,

    pub source_kind: SourceKind,
}

/// Directory of persisted schema snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    /// Open (and create if needed) the store directory
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::io(&data_dir, e))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the document for `id`
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", id, SNAPSHOT_EXTENSION))
    }

    /// Write `schema` under `id`; fails if `id` already exists
    pub fn persist(&self, id: &str, schema: &Schema) -> Result<PathBuf, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }

        let json = schema
            .to_json()
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        let path = self.path_for(id);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StoreError::AlreadyExists(id.to_string()),
                _ => StoreError::io(&path, e),
            })?;

        let written = file.write_all(json.as_bytes()).and_then(|_| file.flush());
        drop(file);

        if let Err(e) = written {
            let _ = std::fs::remove_file(&path);
            return Err(StoreError::io(&path, e));
        }

        info!("Schema saved to {}", path.display());
        Ok(path)
    }

    /// Persist under a fresh id derived from `kind` and `timestamp`
    ///
    /// Returns the id that was claimed.
    pub fn create(
        &self,
        kind: SourceKind,
        schema: &Schema,
        timestamp: NaiveDateTime,
    ) -> Result<String, StoreError> {
        let base = format!("{}_{}", kind.as_str(), timestamp.format(ID_TIME_FORMAT));

        let mut attempt: u32 = 1;
        loop {
            let id = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };

            match self.persist(&id, schema) {
                Ok(_) => return Ok(id),
                Err(StoreError::AlreadyExists(_)) => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// Load a snapshot; missing or malformed documents yield `None`
    pub fn load(&self, id: &str) -> Option<Schema> {
        if !is_valid_id(id) {
            warn!("Invalid schema id: {}", id);
            return None;
        }

        let path = self.path_for(id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Schema file not found: {}", path.display());
                return None;
            }
            Err(e) => {
                error!("Error loading schema {}: {}", path.display(), e);
                return None;
            }
        };

        match Schema::from_json(&contents) {
            Ok(schema) => Some(schema),
            Err(e) => {
                error!("Error loading schema {}: {}", path.display(), e);
                None
            }
        }
    }

    /// List snapshots, newest first
    pub fn list(&self) -> Result<Vec<SnapshotInfo>, StoreError> {
        let entries =
            std::fs::read_dir(&self.data_dir).map_err(|e| StoreError::io(&self.data_dir, e))?;

        let mut found: Vec<(SortKey, SnapshotInfo)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .map(|id| describe(&id))
            .collect();

        found.sort_by(|(a_key, a), (b_key, b)| b_key.cmp(a_key).then_with(|| b.id.cmp(&a.id)));

        Ok(found.into_iter().map(|(_, info)| info).collect())
    }
}

/// (timestamp, same-second suffix); `None` timestamps sort last
type SortKey = (Option<NaiveDateTime>, u32);

fn describe(id: &str) -> (SortKey, SnapshotInfo) {
    let source_kind = if id.starts_with("pbix_") {
        SourceKind::Pbix
    } else {
        SourceKind::Tmdl
    };

    let parsed = SNAPSHOT_ID.captures(id).and_then(|caps| {
        let time = NaiveDateTime::parse_from_str(&caps[2], ID_TIME_FORMAT).ok()?;
        let suffix = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(1);
        Some((time, suffix))
    });

    let (key, created_at) = match parsed {
        Some((time, suffix)) => ((Some(time), suffix), time.format(DISPLAY_TIME_FORMAT).to_string()),
        None => ((None, 0), UNKNOWN_CREATED_AT.to_string()),
    };

    (
        key,
        SnapshotInfo {
            id: id.to_string(),
            created_at,
            source_kind,
        },
    )
}

/// Ids are single path components made of `[A-Za-z0-9_-]`
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Snapshot store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {0}: {1}")]
    IoError(String, String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Snapshot {0} already exists")]
    AlreadyExists(String),

    #[error("Invalid snapshot id: {0}")]
    InvalidId(String),
}

impl StoreError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        Self::IoError(path.display().to_string(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pbischema_core::SchemaTable;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn sample() -> Schema {
        Schema {
            tables: vec![SchemaTable {
                name: "Sales".into(),
                columns: vec![],
            }],
            ..Schema::default()
        }
    }

    #[test]
    fn create_then_load() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path().join("schemas")).unwrap();

        let id = store.create(SourceKind::Tmdl, &sample(), at(9, 30, 0)).unwrap();
        assert_eq!(id, "tmdl_20250314093000");
        assert_eq!(store.load(&id), Some(sample()));

        let raw = std::fs::read_to_string(store.path_for(&id)).unwrap();
        assert!(raw.contains("\n  \"tables\""));
    }

    #[test]
    fn same_second_ids_get_suffixes() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();

        let first = store.create(SourceKind::Pbix, &sample(), at(10, 0, 0)).unwrap();
        let second = store.create(SourceKind::Pbix, &Schema::default(), at(10, 0, 0)).unwrap();
        let third = store.create(SourceKind::Pbix, &Schema::default(), at(10, 0, 0)).unwrap();

        assert_eq!(first, "pbix_20250314100000");
        assert_eq!(second, "pbix_20250314100000-2");
        assert_eq!(third, "pbix_20250314100000-3");
        assert_eq!(store.load(&first), Some(sample()));
    }

    #[test]
    fn persist_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();

        store.persist("tmdl_20250314093000", &sample()).unwrap();
        let err = store
            .persist("tmdl_20250314093000", &Schema::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.load("tmdl_20250314093000"), Some(sample()));
    }

    #[test]
    fn load_missing_malformed_and_invalid_ids() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        std::fs::write(store.path_for("tmdl_20250101000000"), "{ nope").unwrap();

        assert_eq!(store.load("tmdl_20990101000000"), None);
        assert_eq!(store.load("tmdl_20250101000000"), None);
        assert_eq!(store.load("../etc/passwd"), None);
        assert!(matches!(
            store.persist("a/b", &sample()),
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn list_sorts_newest_first_with_unknown_last() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();

        store.create(SourceKind::Tmdl, &sample(), at(8, 0, 0)).unwrap();
        store.create(SourceKind::Pbix, &sample(), at(9, 0, 0)).unwrap();
        store.create(SourceKind::Pbix, &sample(), at(9, 0, 0)).unwrap();
        store.persist("legacy", &sample()).unwrap();
        store.persist("pbix_2025", &sample()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        let ids: Vec<&str> = listed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "pbix_20250314090000-2",
                "pbix_20250314090000",
                "tmdl_20250314080000",
                "pbix_2025",
                "legacy",
            ]
        );

        assert_eq!(listed[0].created_at, "2025-03-14 09:00:00");
        assert_eq!(listed[0].source_kind, SourceKind::Pbix);
        assert_eq!(listed[3].created_at, "unknown");
        assert_eq!(listed[3].source_kind, SourceKind::Pbix);
        assert_eq!(listed[4].source_kind, SourceKind::Tmdl);
    }

    #[test]
    fn impossible_timestamp_is_unknown() {
        let (_, info) = describe("tmdl_20251399250000");
        assert_eq!(info.created_at, "unknown");
    }
}
