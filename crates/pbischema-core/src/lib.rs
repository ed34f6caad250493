//! pbischema Core
//!
//! Shared domain model for Power BI model extraction: the entities both
//! extractors produce, the canonical schema every snapshot is stored in,
//! and the configuration file format.
//! Field names of the canonical schema are part of the snapshot format - never rename them.

pub mod schema;
pub mod config;

pub use schema::{
    Annotations, Column, Measure, ModelInfo, Relationship, Schema, SchemaColumn, SchemaMeasure,
    SchemaTable, SourceKind, Table, VisualField, Visualization, DEFAULT_CROSS_FILTERING,
    DEFAULT_SUMMARIZE_BY,
};
pub use config::{Config, ConfigError, PbixConfig, DATA_DIR_ENV};
