//! Model entities and the canonical schema shape
//!
//! Every optional property resolves to a documented default instead of
//! being absent, so consumers never have to check for missing keys.
//! The one exception is `Relationship::to_cardinality`, which is only
//! emitted when the source declared it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value annotations attached to a model object
pub type Annotations = BTreeMap<String, String>;

/// Default `summarizeBy` for columns that do not declare one
pub const DEFAULT_SUMMARIZE_BY: &str = "none";

/// Default `crossFilteringBehavior` for relationships
pub const DEFAULT_CROSS_FILTERING: &str = "automatic";

/// Kind of artifact a schema was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Directory of TMDL text files
    Tmdl,

    /// Zip-packaged PBIX report
    Pbix,
}

impl SourceKind {
    /// Stable identifier, also used as the snapshot id prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tmdl => "tmdl",
            Self::Pbix => "pbix",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tmdl" => Ok(Self::Tmdl),
            "pbix" => Ok(Self::Pbix),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name
    pub name: String,

    /// Free-form data type as written by the source (empty when unknown)
    #[serde(default)]
    pub data_type: String,

    /// Display format string
    #[serde(default)]
    pub format_string: String,

    /// Lineage tag
    #[serde(default)]
    pub lineage_tag: String,

    /// Default aggregation
    #[serde(default = "default_summarize_by")]
    pub summarize_by: String,

    /// Column-level annotations
    #[serde(default)]
    pub annotations: Annotations,
}

impl Column {
    /// Create a column with every property at its default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: String::new(),
            format_string: String::new(),
            lineage_tag: String::new(),
            summarize_by: DEFAULT_SUMMARIZE_BY.to_string(),
            annotations: Annotations::new(),
        }
    }

    /// Set data type
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Set summarizeBy
    pub fn with_summarize_by(mut self, summarize_by: impl Into<String>) -> Self {
        self.summarize_by = summarize_by.into();
        self
    }
}

/// A named DAX calculation owned by exactly one table
///
/// The expression is opaque text and is never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Measure name
    pub name: String,

    /// DAX expression, possibly multi-line
    #[serde(default)]
    pub expression: String,

    /// Display format string
    #[serde(default)]
    pub format_string: String,

    /// Lineage tag
    #[serde(default)]
    pub lineage_tag: String,

    /// Measure-level annotations
    #[serde(default)]
    pub annotations: Annotations,

    /// Name of the owning table
    #[serde(default)]
    pub table: String,
}

impl Measure {
    /// Create a measure owned by `table`
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            format_string: String::new(),
            lineage_tag: String::new(),
            annotations: Annotations::new(),
            table: table.into(),
        }
    }

    /// Set format string
    pub fn with_format_string(mut self, format_string: impl Into<String>) -> Self {
        self.format_string = format_string.into();
        self
    }
}

/// A directed link between two columns
///
/// Table names are not validated against the parsed tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,

    /// Whether the relationship is active
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Cross filter direction
    #[serde(default = "default_cross_filtering")]
    pub cross_filtering_behavior: String,

    /// Cardinality of the "to" side, only present when declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_cardinality: Option<String>,
}

impl Relationship {
    /// Create an active relationship with automatic cross filtering
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
            is_active: true,
            cross_filtering_behavior: DEFAULT_CROSS_FILTERING.to_string(),
            to_cardinality: None,
        }
    }

    /// Set activity
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Set the "to" side cardinality
    pub fn with_to_cardinality(mut self, cardinality: impl Into<String>) -> Self {
        self.to_cardinality = Some(cardinality.into());
        self
    }

    /// Identity used for deduplication: (fromTable, fromColumn, toTable, toColumn)
    pub fn endpoints(&self) -> (&str, &str, &str, &str) {
        (
            &self.from_table,
            &self.from_column,
            &self.to_table,
            &self.to_column,
        )
    }
}

/// Model-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default)]
    pub culture: String,

    #[serde(default)]
    pub source_query_culture: String,

    /// Table names referenced by the model (`ref table`)
    #[serde(default)]
    pub tables: Vec<String>,

    #[serde(default)]
    pub annotations: Annotations,
}

/// One field bound to a visual role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualField {
    /// Role name (Category, Y, Values, ...)
    pub role: String,

    /// Query reference, e.g. `Sales.Region`
    pub field: String,
}

/// A report visual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    /// Visual type (barChart, card, ...)
    #[serde(rename = "type")]
    pub visual_type: String,

    /// Role/field bindings in projection order
    #[serde(default)]
    pub fields: Vec<VisualField>,
}

impl Visualization {
    /// Create a visual without field bindings
    pub fn new(visual_type: impl Into<String>) -> Self {
        Self {
            visual_type: visual_type.into(),
            fields: Vec::new(),
        }
    }

    /// Append a role/field binding
    pub fn with_field(mut self, role: impl Into<String>, field: impl Into<String>) -> Self {
        self.fields.push(VisualField {
            role: role.into(),
            field: field.into(),
        });
        self
    }
}

/// A table with its columns and measures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,

    /// Ordered list of columns
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Ordered list of measures
    #[serde(default)]
    pub measures: Vec<Measure>,
}

impl Table {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            measures: Vec::new(),
        }
    }

    /// Set columns
    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Column as stored in the canonical schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    pub name: String,

    #[serde(default)]
    pub data_type: String,

    #[serde(default = "default_summarize_by")]
    pub summarize_by: String,
}

impl From<&Column> for SchemaColumn {
    fn from(column: &Column) -> Self {
        Self {
            name: column.name.clone(),
            data_type: column.data_type.clone(),
            summarize_by: column.summarize_by.clone(),
        }
    }
}

/// Table as stored in the canonical schema (name and columns only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
}

/// Measure as stored in the canonical schema, tagged with its table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMeasure {
    pub name: String,

    #[serde(default)]
    pub expression: String,

    #[serde(default)]
    pub table: String,

    #[serde(default)]
    pub format_string: String,
}

impl From<&Measure> for SchemaMeasure {
    fn from(measure: &Measure) -> Self {
        Self {
            name: measure.name.clone(),
            expression: measure.expression.clone(),
            table: measure.table.clone(),
            format_string: measure.format_string.clone(),
        }
    }
}

/// The canonical schema shape shared by every source kind
///
/// Measures are always flattened to the top level and tagged with the
/// owning table, whatever shape the extractor produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<SchemaTable>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub measures: Vec<SchemaMeasure>,

    /// Report visuals (only PBIX sources carry any)
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a table by name
    pub fn find_table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Get table names in order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Measures owned by `table`
    pub fn measures_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SchemaMeasure> {
        self.measures.iter().filter(move |m| m.table == table)
    }

    /// True when nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.relationships.is_empty()
            && self.measures.is_empty()
            && self.visualizations.is_empty()
    }

    /// Serialize to indented JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_true() -> bool {
    true
}

fn default_summarize_by() -> String {
    DEFAULT_SUMMARIZE_BY.to_string()
}

fn default_cross_filtering() -> String {
    DEFAULT_CROSS_FILTERING.to_string()
}
