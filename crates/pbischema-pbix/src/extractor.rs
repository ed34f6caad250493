//! PBIX extraction entry point

use crate::error::PbixError;
use crate::merge::{merge_partials, PbixMetadata};
use crate::package::{PackageLimits, PbixPackage};
use crate::strategies::{
    BinaryScanStrategy, ConnectionsStrategy, LayoutStrategy, SchemaJsonStrategy,
};
use crate::strategy::ExtractionStrategy;
use pbischema_core::PbixConfig;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Runs every strategy against a package and merges the results
pub struct PbixExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    limits: PackageLimits,
}

impl Default for PbixExtractor {
    fn default() -> Self {
        Self::new(&PbixConfig::default())
    }
}

impl PbixExtractor {
    /// Extractor with the standard strategy order:
    /// schema JSON, binary scan, connections, layout
    pub fn new(config: &PbixConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(SchemaJsonStrategy::new(&config.schema_marker)),
                Box::new(BinaryScanStrategy::new(&config.data_model_entry)),
                Box::new(ConnectionsStrategy::new(&config.connections_entry)),
                Box::new(LayoutStrategy::new(&config.layout_marker)),
            ],
            limits: PackageLimits::from(config),
        }
    }

    /// Extractor with a custom strategy list (earlier strategies take precedence)
    pub fn with_strategies(
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        limits: PackageLimits,
    ) -> Self {
        Self { strategies, limits }
    }

    /// Names of the configured strategies, in run order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract from a package file
    pub fn extract_path(&self, path: impl AsRef<Path>) -> Result<PbixMetadata, PbixError> {
        let path = path.as_ref();
        info!("Extracting PBIX metadata from {}", path.display());
        let mut package = PbixPackage::open(path, self.limits).inspect_err(|e| {
            error!("Error opening PBIX package {}: {}", path.display(), e);
        })?;
        Ok(self.extract_package(&mut package))
    }

    /// Extract from an in-memory package
    pub fn extract_bytes(&self, bytes: Vec<u8>) -> Result<PbixMetadata, PbixError> {
        info!("Extracting PBIX metadata from {} bytes", bytes.len());
        let mut package = PbixPackage::from_bytes(bytes, self.limits).inspect_err(|e| {
            error!("Error opening PBIX package: {}", e);
        })?;
        Ok(self.extract_package(&mut package))
    }

    /// Extract from any seekable reader
    pub fn extract_reader<R: Read + Seek + 'static>(
        &self,
        reader: R,
    ) -> Result<PbixMetadata, PbixError> {
        let mut package = PbixPackage::from_reader(reader, self.limits)?;
        Ok(self.extract_package(&mut package))
    }

    /// Run every strategy; a failing strategy contributes nothing
    pub fn extract_package(&self, package: &mut PbixPackage) -> PbixMetadata {
        info!("Found {} entries in PBIX", package.len());
        debug!(entries = ?package.entry_names(), "PBIX entries");

        let mut partials = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.extract(package) {
                Ok(partial) => {
                    debug!(
                        strategy = strategy.name(),
                        tables = partial.tables.len(),
                        relationships = partial.relationships.len(),
                        visualizations = partial.visualizations.len(),
                        "Strategy finished"
                    );
                    partials.push(partial);
                }
                Err(e) if e.is_missing() => warn!(strategy = strategy.name(), "{}", e),
                Err(e) => error!(strategy = strategy.name(), "{}", e),
            }
        }

        let metadata = merge_partials(partials);
        info!(
            tables = metadata.tables.len(),
            relationships = metadata.relationships.len(),
            visualizations = metadata.visualizations.len(),
            "PBIX extraction complete"
        );
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::test_support::zip_bytes;
    use crate::strategy::PartialExtraction;
    use pbischema_core::Table;

    struct Fixed(&'static str, Vec<&'static str>);

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn extract(&self, _: &mut PbixPackage) -> Result<PartialExtraction, PbixError> {
            Ok(PartialExtraction {
                tables: self.1.iter().map(|n| Table::new(*n)).collect(),
                ..Default::default()
            })
        }
    }

    struct Failing;

    impl ExtractionStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _: &mut PbixPackage) -> Result<PartialExtraction, PbixError> {
            Err(PbixError::InvalidJson {
                path: "x".into(),
                reason: "bad".into(),
            })
        }
    }

    #[test]
    fn default_strategy_order() {
        assert_eq!(
            PbixExtractor::default().strategy_names(),
            vec!["schema-json", "binary-scan", "connections-json", "layout-json"]
        );
    }

    #[test]
    fn failing_strategy_does_not_stop_siblings() {
        let extractor = PbixExtractor::with_strategies(
            vec![
                Box::new(Fixed("first", vec!["A"])),
                Box::new(Failing),
                Box::new(Fixed("second", vec!["A", "B"])),
            ],
            PackageLimits::default(),
        );

        let metadata = extractor.extract_bytes(zip_bytes(&[("x", b"")])).unwrap();
        let names: Vec<&str> = metadata.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn unreadable_package_is_fatal() {
        let err = PbixExtractor::default()
            .extract_bytes(b"PK but not really".to_vec())
            .unwrap_err();
        assert!(matches!(err, PbixError::NotZipContainer));
    }
}
