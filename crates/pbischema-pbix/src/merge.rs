//! Merging strategy results

use crate::strategy::PartialExtraction;
use pbischema_core::{Relationship, Table, Visualization};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Merged PBIX extraction result
///
/// All three arrays are always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbixMetadata {
    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub visualizations: Vec<Visualization>,
}

impl PbixMetadata {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relationships.is_empty() && self.visualizations.is_empty()
    }

    /// Serialize to indented JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Merge partial results in the order given
///
/// - tables: deduplicated by exact name, the first writer wins
/// - relationships: deduplicated by (fromTable, fromColumn, toTable, toColumn)
/// - visualizations: concatenated, never deduplicated
pub fn merge_partials<I>(partials: I) -> PbixMetadata
where
    I: IntoIterator<Item = PartialExtraction>,
{
    let mut merged = PbixMetadata::default();
    let mut table_names: HashSet<String> = HashSet::new();
    let mut endpoints: HashSet<(String, String, String, String)> = HashSet::new();

    for partial in partials {
        for table in partial.tables {
            if table_names.insert(table.name.clone()) {
                merged.tables.push(table);
            }
        }

        for relationship in partial.relationships {
            let (ft, fc, tt, tc) = relationship.endpoints();
            let key = (ft.to_string(), fc.to_string(), tt.to_string(), tc.to_string());
            if endpoints.insert(key) {
                merged.relationships.push(relationship);
            }
        }

        merged.visualizations.extend(partial.visualizations);
    }

    merged
}
