//! Extraction orchestration and normalization
//!
//! Both extractors produce differently shaped output: TMDL yields a
//! name-keyed table map with measures nested per table, PBIX a flat table
//! list. Normalization turns either into the canonical [`Schema`], with
//! measures lifted to a flat list tagged with their owning table.

use crate::source::{materialize_files, SchemaSource};
use crate::store::{SnapshotInfo, SnapshotStore, StoreError};
use chrono::Local;
use pbischema_core::{Config, PbixConfig, Schema, SchemaMeasure, SchemaTable, SourceKind};
use pbischema_pbix::{PbixError, PbixExtractor, PbixMetadata};
use pbischema_tmdl::{TmdlError, TmdlParser, TmdlProject};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

/// A persisted extraction result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub source_kind: SourceKind,
    pub schema: Schema,
}

/// Single entry point for extracting, persisting and reading schemas
pub struct SchemaNormalizer {
    store: SnapshotStore,
    pbix: PbixExtractor,
}

impl SchemaNormalizer {
    /// Normalizer persisting into `store`
    pub fn new(store: SnapshotStore, pbix: &PbixConfig) -> Self {
        Self {
            store,
            pbix: PbixExtractor::new(pbix),
        }
    }

    /// Normalizer for a loaded configuration (opens `data_dir`)
    pub fn from_config(config: &Config) -> Result<Self, NormalizeError> {
        let store = SnapshotStore::open(&config.data_dir)?;
        Ok(Self::new(store, &config.pbix))
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Extract, normalize and persist under a new snapshot id
    ///
    /// Extractor errors are returned unchanged; nothing is persisted then.
    pub fn extract(&self, source: SchemaSource) -> Result<Snapshot, NormalizeError> {
        let source_kind = source.kind();
        let schema = self.extract_schema(source).inspect_err(|e| {
            error!("Error extracting from {}: {}", source_kind, e);
        })?;

        let id = self
            .store
            .create(source_kind, &schema, Local::now().naive_local())?;
        info!(
            id = %id,
            tables = schema.tables.len(),
            measures = schema.measures.len(),
            relationships = schema.relationships.len(),
            "Snapshot created"
        );

        Ok(Snapshot {
            id,
            source_kind,
            schema,
        })
    }

    /// Extract and normalize without persisting
    pub fn extract_schema(&self, source: SchemaSource) -> Result<Schema, NormalizeError> {
        match source {
            SchemaSource::TmdlDirectory(dir) => Ok(normalize_tmdl(&parse_tmdl(&dir)?)),
            SchemaSource::TmdlFiles(files) => {
                let workspace = materialize_files(&files)
                    .map_err(|e| NormalizeError::Workspace(e.to_string()))?;
                let project = parse_tmdl(workspace.path())?;
                Ok(normalize_tmdl(&project))
            }
            SchemaSource::PbixFile(path) => Ok(normalize_pbix(&self.pbix.extract_path(path)?)),
            SchemaSource::PbixBytes(bytes) => {
                Ok(normalize_pbix(&self.pbix.extract_bytes(bytes)?))
            }
        }
    }

    /// Parse a TMDL directory into its full, unnormalized structure
    pub fn raw_tmdl(&self, dir: &Path) -> Result<TmdlProject, NormalizeError> {
        parse_tmdl(dir)
    }

    /// Read a snapshot; unknown or unreadable ids yield `None`
    pub fn load(&self, id: &str) -> Option<Schema> {
        self.store.load(id)
    }

    /// Persisted snapshots, newest first
    pub fn list(&self) -> Result<Vec<SnapshotInfo>, NormalizeError> {
        Ok(self.store.list()?)
    }
}

fn parse_tmdl(dir: &Path) -> Result<TmdlProject, NormalizeError> {
    Ok(TmdlParser::new(dir).parse_project()?)
}

/// Canonical schema from a parsed TMDL project
pub fn normalize_tmdl(project: &TmdlProject) -> Schema {
    let mut schema = Schema::new();

    for table in project.tables.values() {
        schema.tables.push(SchemaTable {
            name: table.name.clone(),
            columns: table.columns.iter().map(Into::into).collect(),
        });
        schema.measures.extend(table.measures.iter().map(|m| SchemaMeasure {
            table: table.name.clone(),
            ..SchemaMeasure::from(m)
        }));
    }

    schema.relationships = project
        .relationships
        .iter()
        .map(|r| r.relationship.clone())
        .collect();

    schema
}

/// Canonical schema from merged PBIX metadata
pub fn normalize_pbix(metadata: &PbixMetadata) -> Schema {
    let mut schema = Schema::new();

    for table in &metadata.tables {
        schema.tables.push(SchemaTable {
            name: table.name.clone(),
            columns: table.columns.iter().map(Into::into).collect(),
        });
        schema.measures.extend(table.measures.iter().map(|m| SchemaMeasure {
            table: table.name.clone(),
            ..SchemaMeasure::from(m)
        }));
    }

    schema.relationships = metadata.relationships.clone();
    schema.visualizations = metadata.visualizations.clone();
    schema
}

/// Normalization errors
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Tmdl(#[from] TmdlError),

    #[error(transparent)]
    Pbix(#[from] PbixError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to prepare temporary workspace: {0}")]
    Workspace(String),
}
