//! Report visuals from layout entries

use crate::error::PbixError;
use crate::package::PbixPackage;
use crate::strategy::{ExtractionStrategy, PartialExtraction};
use crate::text::decode_text;
use pbischema_core::Visualization;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{error, info};

const REPORT_LAYOUT: &str = "Report/Layout";
const UNKNOWN_VISUAL: &str = "unknown";
const PLACEHOLDER_TYPES: [&str; 2] = ["null", "undefined"];

static VISUAL_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"visualType['"\s:=]+([A-Za-z0-9_]+)"#).unwrap());

/// Walks every layout entry for `singleVisual` containers
///
/// A layout entry that is not valid JSON is scanned for `visualType`
/// tokens instead. One unreadable entry never stops the others.
#[derive(Debug, Clone)]
pub struct LayoutStrategy {
    marker: String,
}

impl LayoutStrategy {
    /// `marker` is matched as a substring of entry names
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Layout entries: `*<marker>*.json` plus `Report/Layout`
    pub fn is_layout_entry(&self, name: &str) -> bool {
        name.contains(&self.marker) && (name.ends_with(".json") || name == REPORT_LAYOUT)
    }
}

impl ExtractionStrategy for LayoutStrategy {
    fn name(&self) -> &'static str {
        "layout-json"
    }

    fn extract(&self, package: &mut PbixPackage) -> Result<PartialExtraction, PbixError> {
        let entries: Vec<String> = package
            .entry_names()
            .into_iter()
            .filter(|name| self.is_layout_entry(name))
            .collect();

        if entries.is_empty() {
            return Err(PbixError::EntryNotFound(format!("{} layout", self.marker)));
        }
        info!("Found {} layout entries", entries.len());

        let mut partial = PartialExtraction::default();
        for entry in &entries {
            info!("Processing layout entry: {}", entry);
            match package.read_entry(entry) {
                Ok(bytes) => partial
                    .visualizations
                    .extend(visualizations_from_text(&decode_text(&bytes))),
                Err(e) => error!("Error processing layout entry {}: {}", entry, e),
            }
        }

        Ok(partial)
    }
}

/// Visuals from one decoded layout document
pub fn visualizations_from_text(text: &str) -> Vec<Visualization> {
    match serde_json::from_str::<Value>(text) {
        Ok(layout) => visualizations_from_layout(&layout),
        Err(e) => {
            error!("Layout is not valid JSON ({}), scanning text", e);
            VISUAL_TYPE
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .filter(|t| !PLACEHOLDER_TYPES.contains(&t.to_ascii_lowercase().as_str()))
                .map(Visualization::new)
                .collect()
        }
    }
}

/// Visuals from a parsed layout document
///
/// Walks `sections[].visualContainers[]`, or a top-level
/// `visualContainers[]` when there are no sections.
pub fn visualizations_from_layout(layout: &Value) -> Vec<Visualization> {
    let containers: Vec<&Value> = if let Some(sections) = layout.get("sections") {
        sections
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|section| section.get("visualContainers").and_then(Value::as_array))
            .flatten()
            .collect()
    } else {
        layout
            .get("visualContainers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .collect()
    };

    containers.into_iter().filter_map(visual_from_container).collect()
}

fn visual_from_container(container: &Value) -> Option<Visualization> {
    let config = container.get("config")?;

    // config is usually a JSON document serialized into a string
    let parsed;
    let config = match config {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).ok()?;
            &parsed
        }
        other => other,
    };

    let single = config.get("singleVisual")?;
    let mut visual = Visualization::new(
        single
            .get("visualType")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_VISUAL),
    );

    if let Some(projections) = single.get("projections").and_then(Value::as_object) {
        for (role, items) in projections {
            for item in items.as_array().into_iter().flatten() {
                if let Some(query_ref) = item.get("queryRef").and_then(Value::as_str) {
                    visual = visual.with_field(role.as_str(), query_ref);
                }
            }
        }
    }

    Some(visual)
}
