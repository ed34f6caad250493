//! pbischema PBIX extraction
//!
//! Best-effort recovery of tables, relationships and report visuals from a
//! zip-packaged PBIX file. Four independent strategies each read one kind of
//! package entry; their results are merged by an explicit reducer. Only a
//! package that cannot be opened at all is an error.

pub mod error;
pub mod extractor;
pub mod merge;
pub mod package;
pub mod strategies;
pub mod strategy;
pub mod text;

pub use error::PbixError;
pub use extractor::PbixExtractor;
pub use merge::{merge_partials, PbixMetadata};
pub use package::{PackageLimits, PbixPackage};
pub use strategies::{BinaryScanStrategy, ConnectionsStrategy, LayoutStrategy, SchemaJsonStrategy};
pub use strategy::{ExtractionStrategy, PartialExtraction};
pub use text::{decode_lossy, decode_text};
