//! Extraction strategy seam

use crate::error::PbixError;
use crate::package::PbixPackage;
use pbischema_core::{Relationship, Table, Visualization};
use serde::{Deserialize, Serialize};

/// What a single strategy recovered from a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialExtraction {
    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub visualizations: Vec<Visualization>,
}

impl PartialExtraction {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relationships.is_empty() && self.visualizations.is_empty()
    }
}

/// One independent way of reading model information out of a package
///
/// Strategies never see each other's output; precedence between them is
/// decided by the reducer in [`crate::merge`].
pub trait ExtractionStrategy {
    /// Strategy name, used in log output
    fn name(&self) -> &'static str;

    /// Read what this strategy can from the package
    fn extract(&self, package: &mut PbixPackage) -> Result<PartialExtraction, PbixError>;
}
