//! Table stubs from the `Connections` JSON entry

use crate::error::PbixError;
use crate::package::PbixPackage;
use crate::strategy::{ExtractionStrategy, PartialExtraction};
use crate::text::decode_text;
use pbischema_core::{Column, Table};
use serde_json::Value;
use tracing::{debug, info};

const UNKNOWN_TYPE: &str = "unknown";

/// Reads `Tables` (with columns) or, failing that, `Expressions` names
#[derive(Debug, Clone)]
pub struct ConnectionsStrategy {
    entry: String,
}

impl ConnectionsStrategy {
    /// `entry` is the exact entry name
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
        }
    }
}

impl ExtractionStrategy for ConnectionsStrategy {
    fn name(&self) -> &'static str {
        "connections-json"
    }

    fn extract(&self, package: &mut PbixPackage) -> Result<PartialExtraction, PbixError> {
        if !package.contains(&self.entry) {
            return Err(PbixError::EntryNotFound(self.entry.clone()));
        }
        info!("Found {} entry", self.entry);

        let bytes = package.read_entry(&self.entry)?;
        let document: Value =
            serde_json::from_str(&decode_text(&bytes)).map_err(|e| PbixError::InvalidJson {
                path: self.entry.clone(),
                reason: e.to_string(),
            })?;

        let tables = if let Some(tables) = document.get("Tables").and_then(Value::as_array) {
            tables.iter().filter_map(table_from_connection).collect()
        } else if let Some(expressions) = document.get("Expressions").and_then(Value::as_array) {
            expressions
                .iter()
                .filter_map(|e| e.get("Name").and_then(Value::as_str))
                .filter(|name| !name.is_empty())
                .map(Table::new)
                .collect()
        } else {
            debug!("{} lists neither Tables nor Expressions", self.entry);
            Vec::new()
        };

        Ok(PartialExtraction {
            tables,
            ..Default::default()
        })
    }
}

fn table_from_connection(value: &Value) -> Option<Table> {
    let name = value
        .get("Name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())?;

    let columns = value
        .get("Columns")
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .map(|col| {
                    let name = col.get("Name").and_then(Value::as_str).unwrap_or_default();
                    let data_type = col
                        .get("DataType")
                        .and_then(Value::as_str)
                        .unwrap_or(UNKNOWN_TYPE);
                    Column::new(name).with_data_type(data_type)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Table::new(name).with_columns(columns))
}
