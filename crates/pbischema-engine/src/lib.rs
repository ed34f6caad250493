//! pbischema engine
//!
//! Orchestrates the two extractors behind one entry point:
//! - dispatch on the source kind and normalize into the canonical schema
//! - persist immutable snapshots and read them back
//! - project a schema into prompt context text

pub mod context;
pub mod normalizer;
pub mod source;
pub mod store;

pub use context::{ContextProjector, MarkdownProjector};
pub use normalizer::{normalize_pbix, normalize_tmdl, NormalizeError, SchemaNormalizer, Snapshot};
pub use source::{materialize_files, SchemaSource};
pub use store::{SnapshotInfo, SnapshotStore, StoreError, UNKNOWN_CREATED_AT};
