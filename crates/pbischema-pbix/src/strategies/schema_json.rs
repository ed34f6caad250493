//! Tables, measures and relationships from the `DataModelSchema` JSON entry

use crate::error::PbixError;
use crate::package::PbixPackage;
use crate::strategy::{ExtractionStrategy, PartialExtraction};
use crate::text::decode_text;
use pbischema_core::{
    Column, Measure, Relationship, Table, DEFAULT_CROSS_FILTERING, DEFAULT_SUMMARIZE_BY,
};
use serde_json::Value;
use tracing::{debug, info};

/// Reads the model section of the schema JSON document
#[derive(Debug, Clone)]
pub struct SchemaJsonStrategy {
    marker: String,
}

impl SchemaJsonStrategy {
    /// `marker` is matched as a substring of entry names
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl ExtractionStrategy for SchemaJsonStrategy {
    fn name(&self) -> &'static str {
        "schema-json"
    }

    fn extract(&self, package: &mut PbixPackage) -> Result<PartialExtraction, PbixError> {
        let entry = package
            .find_entry_containing(&self.marker)
            .ok_or_else(|| PbixError::EntryNotFound(self.marker.clone()))?;
        info!("Found schema entry: {}", entry);

        let bytes = package.read_entry(&entry)?;
        let document: Value =
            serde_json::from_str(&decode_text(&bytes)).map_err(|e| PbixError::InvalidJson {
                path: entry.clone(),
                reason: e.to_string(),
            })?;

        let mut partial = PartialExtraction::default();
        let Some(model) = document.get("model") else {
            debug!("Schema entry {} has no model section", entry);
            return Ok(partial);
        };

        if let Some(tables) = model.get("tables").and_then(Value::as_array) {
            info!("Found {} tables in schema", tables.len());
            partial.tables = tables.iter().filter_map(parse_table).collect();
        }

        if let Some(relationships) = model.get("relationships").and_then(Value::as_array) {
            info!("Found {} relationships in schema", relationships.len());
            partial.relationships = relationships.iter().map(parse_relationship).collect();
        }

        Ok(partial)
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn parse_table(value: &Value) -> Option<Table> {
    let name = str_field(value, "name").filter(|n| !n.is_empty())?;

    let columns = value
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().filter_map(parse_column).collect())
        .unwrap_or_default();

    let measures = value
        .get("measures")
        .and_then(Value::as_array)
        .map(|ms| ms.iter().filter_map(|m| parse_measure(m, name)).collect())
        .unwrap_or_default();

    Some(Table {
        name: name.to_string(),
        columns,
        measures,
    })
}

fn parse_column(value: &Value) -> Option<Column> {
    let mut column = Column::new(str_field(value, "name")?);
    column.data_type = str_field(value, "dataType").unwrap_or_default().to_string();
    column.format_string = str_field(value, "formatString").unwrap_or_default().to_string();
    column.lineage_tag = str_field(value, "lineageTag").unwrap_or_default().to_string();
    column.summarize_by = str_field(value, "summarizeBy")
        .unwrap_or(DEFAULT_SUMMARIZE_BY)
        .to_string();
    Some(column)
}

fn parse_measure(value: &Value, table: &str) -> Option<Measure> {
    let name = str_field(value, "name")?;
    let mut measure = Measure::new(name, expression_text(value.get("expression")), table);
    measure.format_string = str_field(value, "formatString").unwrap_or_default().to_string();
    measure.lineage_tag = str_field(value, "lineageTag").unwrap_or_default().to_string();
    Some(measure)
}

/// Expressions are either a string or an array of lines
fn expression_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn parse_relationship(value: &Value) -> Relationship {
    let field = |key| str_field(value, key).unwrap_or_default();

    let mut relationship = Relationship::new(
        field("fromTable"),
        field("fromColumn"),
        field("toTable"),
        field("toColumn"),
    );
    relationship.is_active = value.get("isActive").and_then(Value::as_bool).unwrap_or(true);
    relationship.cross_filtering_behavior = str_field(value, "crossFilteringBehavior")
        .unwrap_or(DEFAULT_CROSS_FILTERING)
        .to_string();
    relationship.to_cardinality = str_field(value, "toCardinality").map(str::to_string);
    relationship
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::test_support::zip_bytes;
    use crate::package::PackageLimits;
    use pretty_assertions::assert_eq;

    fn run(entries: &[(&str, &[u8])]) -> Result<PartialExtraction, PbixError> {
        let mut package =
            PbixPackage::from_bytes(zip_bytes(entries), PackageLimits::default()).unwrap();
        SchemaJsonStrategy::new("DataModelSchema").extract(&mut package)
    }

    const SCHEMA: &str = r##"{
        "name": "model",
        "model": {
            "tables": [
                {
                    "name": "Sales",
                    "columns": [
                        {"name": "Amount", "dataType": "double", "summarizeBy": "sum", "formatString": "0.00"},
                        {"name": "Region"}
                    ],
                    "measures": [
                        {"name": "Total Sales", "expression": "SUM(Sales[Amount])", "formatString": "#,0"},
                        {"name": "Big Sales", "expression": ["CALCULATE(", "  [Total Sales],", "  Sales[Amount] > 100)"]}
                    ]
                },
                {"columns": [{"name": "orphan"}]}
            ],
            "relationships": [
                {"fromTable": "Sales", "fromColumn": "CustomerID", "toTable": "Customer", "toColumn": "ID"},
                {"fromTable": "Sales", "fromColumn": "DateKey", "toTable": "Date", "toColumn": "Key",
                 "isActive": false, "crossFilteringBehavior": "bothDirections", "toCardinality": "one"}
            ]
        }
    }"##;

    #[test]
    fn reads_tables_measures_and_relationships() {
        let partial = run(&[("DataModelSchema", SCHEMA.as_bytes())]).unwrap();

        assert_eq!(partial.tables.len(), 1);
        let sales = &partial.tables[0];
        assert_eq!(sales.columns[0].data_type, "double");
        assert_eq!(sales.columns[0].summarize_by, "sum");
        assert_eq!(sales.columns[0].format_string, "0.00");
        assert_eq!(sales.columns[1].data_type, "");
        assert_eq!(sales.columns[1].summarize_by, "none");

        assert_eq!(sales.measures[0].table, "Sales");
        assert_eq!(sales.measures[0].format_string, "#,0");
        assert_eq!(
            sales.measures[1].expression,
            "CALCULATE(\n  [Total Sales],\n  Sales[Amount] > 100)"
        );

        assert_eq!(
            partial.relationships[0],
            Relationship::new("Sales", "CustomerID", "Customer", "ID")
        );
        assert!(!partial.relationships[1].is_active);
        assert_eq!(partial.relationships[1].cross_filtering_behavior, "bothDirections");
        assert_eq!(partial.relationships[1].to_cardinality.as_deref(), Some("one"));
    }

    #[test]
    fn utf16_schema_entry() {
        let mut bytes = Vec::new();
        for unit in r#"{"model":{"tables":[{"name":"Date"}]}}"#.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let partial = run(&[("DataModelSchema", &bytes)]).unwrap();
        assert_eq!(partial.tables[0].name, "Date");
    }

    #[test]
    fn missing_entry_and_invalid_json() {
        assert!(run(&[("Version", b"1")]).unwrap_err().is_missing());
        assert!(matches!(
            run(&[("DataModelSchema", b"{not json")]).unwrap_err(),
            PbixError::InvalidJson { .. }
        ));
    }

    #[test]
    fn document_without_model_is_empty() {
        assert!(run(&[("DataModelSchema", b"{}")]).unwrap().is_empty());
    }
}
