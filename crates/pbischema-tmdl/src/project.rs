//! TMDL project loading
//!
//! Locates `model.tmdl`, `relationships.tmdl` and the `tables/` directory
//! (each at the project root or under `definition/`) and parses them. Every
//! part degrades to its empty default independently; only a base directory
//! that exists but cannot be listed is an error.

use crate::parser::{
    parse_model_source, parse_relationships_source, parse_table_source, RelationshipDefinition,
    TableDefinition,
};
use pbischema_core::ModelInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

const DEFINITION_DIR: &str = "definition";
const TABLES_DIR: &str = "tables";
const MODEL_FILE: &str = "model.tmdl";
const RELATIONSHIPS_FILE: &str = "relationships.tmdl";
const TMDL_EXTENSION: &str = "tmdl";

/// Parsed TMDL project (the "raw" shape)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmdlProject {
    /// Model-level metadata
    pub model: ModelInfo,

    /// Tables keyed by file stem, with measures nested per table
    pub tables: BTreeMap<String, TableDefinition>,

    /// Relationships in file order
    pub relationships: Vec<RelationshipDefinition>,
}

impl TmdlProject {
    /// True when nothing was found
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relationships.is_empty() && self.model == ModelInfo::default()
    }

    /// Serialize to indented JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parser for a TMDL project directory
#[derive(Debug, Clone)]
pub struct TmdlParser {
    base_directory: PathBuf,
}

impl TmdlParser {
    /// Create a parser rooted at `base_directory`
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
        }
    }

    /// Project root
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Parse the whole project
    ///
    /// A missing base directory yields an empty project. A base path that
    /// exists but cannot be listed is the only error.
    pub fn parse_project(&self) -> Result<TmdlProject, TmdlError> {
        let base = &self.base_directory;
        info!("Parsing TMDL project in {}", base.display());

        if !base.exists() {
            warn!("Directory not found: {}", base.display());
            return Ok(TmdlProject::default());
        }

        std::fs::read_dir(base)
            .map_err(|e| TmdlError::BaseDirectory(base.display().to_string(), e.to_string()))?;

        let mut project = TmdlProject::default();

        match self.locate_file(MODEL_FILE) {
            Some(path) => {
                info!("Parsing model file: {}", path.display());
                project.model = read_or_default(&path, parse_model_source);
            }
            None => warn!("No {} found", MODEL_FILE),
        }

        match self.locate_file(RELATIONSHIPS_FILE) {
            Some(path) => {
                info!("Parsing relationships file: {}", path.display());
                project.relationships = read_or_default(&path, parse_relationships_source);
            }
            None => warn!("No {} found", RELATIONSHIPS_FILE),
        }

        match self.locate_tables_dir() {
            Some(dir) => project.tables = parse_tables_dir(&dir),
            None => warn!("No tables directory found"),
        }

        info!(
            tables = project.tables.len(),
            relationships = project.relationships.len(),
            "TMDL project parsed"
        );

        Ok(project)
    }

    /// `<base>/<name>`, falling back to `<base>/definition/<name>`
    fn locate_file(&self, name: &str) -> Option<PathBuf> {
        [
            self.base_directory.join(name),
            self.base_directory.join(DEFINITION_DIR).join(name),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }

    fn locate_tables_dir(&self) -> Option<PathBuf> {
        [
            self.base_directory.join(TABLES_DIR),
            self.base_directory.join(DEFINITION_DIR).join(TABLES_DIR),
        ]
        .into_iter()
        .find(|p| p.is_dir())
    }
}

fn parse_tables_dir(dir: &Path) -> BTreeMap<String, TableDefinition> {
    info!("Found tables directory: {}", dir.display());

    let mut tables = BTreeMap::new();
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                error!("Failed to list {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == TMDL_EXTENSION));

    for entry in entries {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping table file with non UTF-8 name: {}", path.display());
            continue;
        };

        info!("Parsing table: {}", stem);
        let table = match read_source(path) {
            Ok(source) => parse_table_source(&source, stem),
            Err(e) => {
                error!("{}", e);
                TableDefinition::empty(stem)
            }
        };
        tables.insert(stem.to_string(), table);
    }

    info!("Parsed {} table files", tables.len());
    tables
}

fn read_or_default<T: Default>(path: &Path, parse: impl FnOnce(&str) -> T) -> T {
    match read_source(path) {
        Ok(source) => parse(&source),
        Err(e) => {
            error!("{}", e);
            T::default()
        }
    }
}

/// Read a TMDL file as UTF-8 text
pub fn read_source(path: &Path) -> Result<String, TmdlError> {
    let bytes = std::fs::read(path)
        .map_err(|e| TmdlError::IoError(path.display().to_string(), e.to_string()))?;

    String::from_utf8(bytes).map_err(|_| TmdlError::EncodingError(path.display().to_string()))
}

/// TMDL parsing errors
#[derive(Debug, thiserror::Error)]
pub enum TmdlError {
    #[error("Base directory {0} cannot be listed: {1}")]
    BaseDirectory(String, String),

    #[error("Failed to read TMDL file {0}: {1}")]
    IoError(String, String),

    #[error("TMDL file {0} is not valid UTF-8")]
    EncodingError(String),
}
