//! Pattern scan over the binary `DataModel` entry
//!
//! The model blob is compressed, so this only recovers whatever identifiers
//! happen to survive as readable text. Its output fills gaps; the reducer
//! drops any table another strategy already produced.

use crate::error::PbixError;
use crate::package::PbixPackage;
use crate::strategy::{ExtractionStrategy, PartialExtraction};
use crate::text::decode_lossy;
use pbischema_core::{Column, Relationship, Table};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::info;

const UNKNOWN_TYPE: &str = "unknown";

static TABLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i:table)['"\s:=]+([A-Za-z0-9_]+)"#).unwrap());

static RELATIONSHIP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9_]+)\[([A-Za-z0-9_]+)\].*?([A-Za-z0-9_]+)\[([A-Za-z0-9_]+)\]")
        .unwrap()
});

/// Recovers table, column and relationship names from raw model bytes
#[derive(Debug, Clone)]
pub struct BinaryScanStrategy {
    entry: String,
}

impl BinaryScanStrategy {
    /// `entry` is the exact entry name
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
        }
    }
}

impl ExtractionStrategy for BinaryScanStrategy {
    fn name(&self) -> &'static str {
        "binary-scan"
    }

    fn extract(&self, package: &mut PbixPackage) -> Result<PartialExtraction, PbixError> {
        if !package.contains(&self.entry) {
            return Err(PbixError::EntryNotFound(self.entry.clone()));
        }
        info!("Found {} entry", self.entry);

        let bytes = package.read_entry(&self.entry)?;
        scan_text(&decode_lossy(&bytes))
    }
}

/// Scan decoded model text
pub fn scan_text(text: &str) -> Result<PartialExtraction, PbixError> {
    let table_names: BTreeSet<&str> = TABLE_TOKEN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| name.len() > 2)
        .collect();

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let pattern = Regex::new(&format!(r"{}[\[\.\s]+([A-Za-z0-9_]+)", regex::escape(name)))?;
        let columns: BTreeSet<&str> = pattern
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|column| column.len() > 1)
            .collect();

        tables.push(
            Table::new(name).with_columns(
                columns
                    .into_iter()
                    .map(|c| Column::new(c).with_data_type(UNKNOWN_TYPE))
                    .collect(),
            ),
        );
    }

    let relationships = RELATIONSHIP_PATTERN
        .captures_iter(text)
        .map(|c| Relationship::new(&c[1], &c[2], &c[3], &c[4]))
        .collect();

    Ok(PartialExtraction {
        tables,
        relationships,
        visualizations: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recovers_tables_and_columns() {
        let text = "\u{1}TABLE 'Sales'\u{0}Sales[Amount]\u{0}Sales.Region x table:ab Customer";
        let partial = scan_text(text).unwrap();

        let names: Vec<&str> = partial.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Sales"]);
        assert_eq!(partial.tables[0].column_names(), vec!["Amount", "Region"]);
        assert_eq!(partial.tables[0].columns[0].data_type, "unknown");
    }

    #[test]
    fn recovers_relationship_quadruples() {
        let text = "Sales[CustomerID] -> Customer[ID]\nSales[DateKey]~Date[Key]";
        let partial = scan_text(text).unwrap();
        assert_eq!(
            partial.relationships,
            vec![
                Relationship::new("Sales", "CustomerID", "Customer", "ID"),
                Relationship::new("Sales", "DateKey", "Date", "Key"),
            ]
        );
    }

    #[test]
    fn noise_yields_nothing() {
        assert!(scan_text("\u{fffd}\u{fffd} 0x00 ab").unwrap().is_empty());
    }
}
