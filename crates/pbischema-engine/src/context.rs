//! Rendering a schema as prompt context

use pbischema_core::Schema;

/// Turns a canonical schema into text for a downstream consumer
pub trait ContextProjector {
    fn project(&self, schema: &Schema) -> String;
}

/// Markdown rendering of tables, measures, relationships and visuals
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownProjector;

impl ContextProjector for MarkdownProjector {
    fn project(&self, schema: &Schema) -> String {
        let mut out = String::from("# POWER BI SCHEMA\n\n");

        out.push_str("## TABLES\n");
        for table in &schema.tables {
            out.push_str(&format!("### Table: {}\n", table.name));
            if !table.columns.is_empty() {
                out.push_str("**Columns:**\n");
                for column in &table.columns {
                    out.push_str(&format!("- {} ({})\n", column.name, column.data_type));
                }
            }
            out.push('\n');
        }

        if !schema.measures.is_empty() {
            out.push_str("## MEASURES\n");
            for measure in &schema.measures {
                out.push_str(&format!("### {} ({})\n", measure.name, measure.table));
                out.push_str(&format!("```dax\n{}\n```\n\n", measure.expression));
            }
        }

        if !schema.relationships.is_empty() {
            out.push_str("## RELATIONSHIPS\n");
            for rel in &schema.relationships {
                let cardinality = rel
                    .to_cardinality
                    .as_ref()
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default();
                let active = if rel.is_active { "" } else { " (inactive)" };
                out.push_str(&format!(
                    "- {}.[{}] → {}.[{}]{}{}\n",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column, cardinality, active
                ));
            }
            out.push('\n');
        }

        if !schema.visualizations.is_empty() {
            out.push_str("## EXISTING VISUALIZATIONS\n");
            for (idx, visual) in schema.visualizations.iter().enumerate() {
                out.push_str(&format!("- Visualization {}: Type: {}\n", idx + 1, visual.visual_type));
                for field in &visual.fields {
                    out.push_str(&format!("  - {}: {}\n", field.role, field.field));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbischema_core::{
        Relationship, SchemaColumn, SchemaMeasure, SchemaTable, Visualization,
    };

    fn schema() -> Schema {
        Schema {
            tables: vec![
                SchemaTable {
                    name: "Sales".into(),
                    columns: vec![SchemaColumn {
                        name: "Amount".into(),
                        data_type: "double".into(),
                        summarize_by: "sum".into(),
                    }],
                },
                SchemaTable {
                    name: "Staging".into(),
                    columns: vec![],
                },
            ],
            relationships: vec![
                Relationship::new("Sales", "CustomerID", "Customer", "ID").with_to_cardinality("many"),
                Relationship::new("Sales", "ShipDate", "Date", "Date").with_active(false),
            ],
            measures: vec![SchemaMeasure {
                name: "Total Sales".into(),
                expression: "SUM(Sales[Amount])".into(),
                table: "Sales".into(),
                format_string: String::new(),
            }],
            visualizations: vec![Visualization::new("barChart").with_field("Category", "Sales.Region")],
        }
    }

    #[test]
    fn renders_every_section() {
        let text = MarkdownProjector.project(&schema());

        assert!(text.starts_with("# POWER BI SCHEMA\n\n## TABLES\n### Table: Sales\n**Columns:**\n- Amount (double)\n\n"));
        assert!(text.contains("### Table: Staging\n\n"));
        assert!(text.contains("## MEASURES\n### Total Sales (Sales)\n```dax\nSUM(Sales[Amount])\n```\n"));
        assert!(text.contains("- Sales.[CustomerID] → Customer.[ID] (many)\n"));
        assert!(text.contains("- Sales.[ShipDate] → Date.[Date] (inactive)\n"));
        assert!(text.contains("- Visualization 1: Type: barChart\n  - Category: Sales.Region\n"));
    }

    #[test]
    fn empty_schema_only_has_headers() {
        assert_eq!(
            MarkdownProjector.project(&Schema::default()),
            "# POWER BI SCHEMA\n\n## TABLES\n"
        );
    }
}
