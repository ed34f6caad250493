//! TMDL project parsing
//!
//! This crate handles:
//! - Tokenizing TMDL text into typed lines (declarations, properties, annotations)
//! - Grouping lines into declaration blocks
//! - Extracting tables, columns, measures, partitions and relationships
//! - Locating project files (root or `definition/` layout) with per-part fallbacks

pub mod lexer;
pub mod parser;
pub mod project;

pub use lexer::{tokenize, DeclarationKind, Line, TokenKind};
pub use parser::{
    group_blocks, parse_model_source, parse_relationships_source, parse_table_source, Block,
    Document, Partition, RelationshipDefinition, TableDefinition,
};
pub use project::{read_source, TmdlError, TmdlParser, TmdlProject};
