//! TMDL declaration parsing
//!
//! Groups the token stream into declaration blocks and turns blocks into
//! model structures. A block's body runs from its declaration to the next
//! declaration line (or end of file). Annotations are routed to the
//! innermost preceding declaration that is less indented than the
//! annotation itself; in unindented files that is the most recent one.

use crate::lexer::{tokenize, DeclarationKind, Line, TokenKind};
use pbischema_core::{Annotations, Column, Measure, ModelInfo, Relationship};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Property lines that never belong to a measure expression
const MEASURE_PROPERTY_PREFIXES: [&str; 3] = ["formatString:", "lineageTag:", "annotation"];

static SOURCE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)source\s*=\s*```(.*?)```").unwrap());

/// A declaration together with its body
#[derive(Debug, Clone)]
pub struct Block<'a> {
    /// Declaration kind
    pub kind: DeclarationKind,

    /// Text after the keyword
    pub header: &'a str,

    /// Indentation of the declaration line
    pub indent: usize,

    /// 1-based line number of the declaration
    pub line: usize,

    /// Non-annotation lines up to the next declaration
    pub body: Vec<Line<'a>>,

    /// Annotations routed to this declaration
    pub annotations: Annotations,
}

impl<'a> Block<'a> {
    /// First value of a `key: value` property in the body
    pub fn property(&self, key: &str) -> Option<&'a str> {
        self.body.iter().find_map(|line| match line.token {
            TokenKind::Property { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }

    /// Declared name (text before `=`, unquoted)
    pub fn name(&self) -> String {
        split_header(self.header).0
    }

    /// Text after the `=` of the declaration line, if any
    pub fn inline_value(&self) -> Option<&'a str> {
        split_header(self.header).1
    }
}

/// Parsed file: its blocks plus annotations that precede every declaration
#[derive(Debug, Clone, Default)]
pub struct Document<'a> {
    pub blocks: Vec<Block<'a>>,
    pub leading_annotations: Annotations,
}

impl<'a> Document<'a> {
    /// Blocks of a given kind, in file order
    pub fn blocks_of(&self, kind: DeclarationKind) -> impl Iterator<Item = &Block<'a>> {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }
}

/// Group tokenized lines into declaration blocks
///
/// An annotation ends the body of the block before it: lines following an
/// annotation only belong to the next declaration.
pub fn group_blocks<'a>(lines: &[Line<'a>]) -> Document<'a> {
    let mut doc = Document::default();
    let mut open_body = true;

    for line in lines {
        match line.token {
            TokenKind::Declaration { kind, header } => {
                open_body = true;
                doc.blocks.push(Block {
                    kind,
                    header,
                    indent: line.indent,
                    line: line.number,
                    body: Vec::new(),
                    annotations: Annotations::new(),
                });
            }
            TokenKind::Annotation { key, value } => {
                let owner = doc
                    .blocks
                    .iter()
                    .rposition(|b| b.indent < line.indent)
                    .or_else(|| doc.blocks.len().checked_sub(1));

                let annotations = match owner {
                    Some(idx) => &mut doc.blocks[idx].annotations,
                    None => &mut doc.leading_annotations,
                };
                annotations.insert(key.to_string(), value.to_string());
                open_body = false;
            }
            TokenKind::DocComment => {}
            _ if !open_body => {}
            _ => {
                if let Some(current) = doc.blocks.last_mut() {
                    current.body.push(*line);
                }
            }
        }
    }

    doc
}

/// A table partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,

    /// Storage mode (import, directQuery, ...)
    #[serde(default)]
    pub mode: String,

    /// Fenced source text, empty when the partition has none
    #[serde(default)]
    pub source: String,
}

/// Everything declared in one table file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<Column>,

    #[serde(default)]
    pub measures: Vec<Measure>,

    #[serde(default)]
    pub partitions: Vec<Partition>,

    #[serde(default)]
    pub annotations: Annotations,
}

impl TableDefinition {
    /// Empty definition named `name`
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A relationship as declared in relationships.tmdl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDefinition {
    /// Relationship id (usually a GUID)
    pub id: String,

    #[serde(flatten)]
    pub relationship: Relationship,

    /// Only present when declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_on_date_behavior: Option<String>,
}

/// Parse a table file
///
/// `fallback_name` is used when the file declares no table name.
pub fn parse_table_source(source: &str, fallback_name: &str) -> TableDefinition {
    let lines = tokenize(source);
    let doc = group_blocks(&lines);

    let table_block = doc.blocks_of(DeclarationKind::Table).next();
    let name = table_block
        .map(|b| b.name())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback_name.to_string());

    let mut annotations = doc.leading_annotations.clone();
    for block in doc.blocks_of(DeclarationKind::Table) {
        annotations.extend(block.annotations.clone());
    }

    TableDefinition {
        columns: doc.blocks_of(DeclarationKind::Column).map(column_from_block).collect(),
        measures: doc
            .blocks_of(DeclarationKind::Measure)
            .map(|b| measure_from_block(b, &name))
            .collect(),
        partitions: doc.blocks_of(DeclarationKind::Partition).map(partition_from_block).collect(),
        annotations,
        name,
    }
}

/// Parse relationships.tmdl
pub fn parse_relationships_source(source: &str) -> Vec<RelationshipDefinition> {
    let lines = tokenize(source);
    let doc = group_blocks(&lines);

    doc.blocks_of(DeclarationKind::Relationship)
        .map(relationship_from_block)
        .collect()
}

/// Parse model.tmdl
///
/// Properties and annotations are collected from anywhere in the file;
/// the first `culture` / `sourceQueryCulture` wins.
pub fn parse_model_source(source: &str) -> ModelInfo {
    let mut info = ModelInfo::default();
    let mut culture = None;
    let mut source_culture = None;

    for line in tokenize(source) {
        match line.token {
            TokenKind::Property { key: "culture", value } if culture.is_none() => {
                culture = Some(value);
            }
            TokenKind::Property {
                key: "sourceQueryCulture",
                value,
            } if source_culture.is_none() => {
                source_culture = Some(value);
            }
            TokenKind::Annotation { key, value } => {
                info.annotations.insert(key.to_string(), value.to_string());
            }
            TokenKind::Text => {
                if let Some(table) = line.text.strip_prefix("ref table ") {
                    info.tables.push(unquote(table.trim()));
                }
            }
            _ => {}
        }
    }

    info.culture = culture.unwrap_or_default().to_string();
    info.source_query_culture = source_culture.unwrap_or_default().to_string();
    info
}

fn column_from_block(block: &Block<'_>) -> Column {
    let mut column = Column::new(block.name());

    if let Some(v) = block.property("dataType") {
        column.data_type = v.to_string();
    }
    if let Some(v) = block.property("formatString") {
        column.format_string = v.to_string();
    }
    if let Some(v) = block.property("lineageTag") {
        column.lineage_tag = v.to_string();
    }
    if let Some(v) = block.property("summarizeBy") {
        column.summarize_by = v.to_string();
    }
    column.annotations = block.annotations.clone();

    column
}

/// Build a measure from its block
///
/// The expression is the inline text after `=` followed by every non-blank
/// body line that does not start with a known property prefix. Other
/// properties (displayFolder, ...) therefore end up in the expression; that
/// is how the format has always been read here.
fn measure_from_block(block: &Block<'_>, table: &str) -> Measure {
    let mut parts: Vec<&str> = Vec::new();

    if let Some(start) = block.inline_value() {
        if !start.is_empty() {
            parts.push(start);
        }
    }

    for line in &block.body {
        let text = line.text;
        if text.is_empty() || MEASURE_PROPERTY_PREFIXES.iter().any(|p| text.starts_with(p)) {
            continue;
        }
        parts.push(text);
    }

    let mut measure = Measure::new(block.name(), parts.join("\n"), table);
    if let Some(v) = block.property("formatString") {
        measure.format_string = v.to_string();
    }
    if let Some(v) = block.property("lineageTag") {
        measure.lineage_tag = v.to_string();
    }
    measure.annotations = block.annotations.clone();

    measure
}

fn partition_from_block(block: &Block<'_>) -> Partition {
    let body = block
        .body
        .iter()
        .map(|l| l.raw)
        .collect::<Vec<_>>()
        .join("\n");

    Partition {
        name: block.name(),
        mode: block.property("mode").unwrap_or_default().to_string(),
        source: SOURCE_FENCE
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    }
}

fn relationship_from_block(block: &Block<'_>) -> RelationshipDefinition {
    let (from_table, from_column) = block
        .property("fromColumn")
        .map(split_column_ref)
        .unwrap_or_default();
    let (to_table, to_column) = block
        .property("toColumn")
        .map(split_column_ref)
        .unwrap_or_default();

    let mut relationship = Relationship::new(from_table, from_column, to_table, to_column);

    if let Some(v) = block.property("isActive") {
        relationship.is_active = v.trim().eq_ignore_ascii_case("true");
    }
    if let Some(v) = block.property("toCardinality") {
        relationship.to_cardinality = Some(v.to_string());
    }

    RelationshipDefinition {
        id: block.header.trim().to_string(),
        relationship,
        join_on_date_behavior: block.property("joinOnDateBehavior").map(str::to_string),
    }
}

/// Split `'Table'.'Column'` on the first `.` and strip quotes from both halves
///
/// A reference without a `.` yields two empty strings.
fn split_column_ref(reference: &str) -> (String, String) {
    match reference.trim().split_once('.') {
        Some((table, column)) => (strip_quotes(table), strip_quotes(column)),
        None => (String::new(), String::new()),
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// Split a declaration header into its unquoted name and optional `=` text
fn split_header(header: &str) -> (String, Option<&str>) {
    let header = header.trim();

    if let Some(rest) = header.strip_prefix('\'') {
        // 'quoted name' with '' as an escaped quote
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c != '\'' {
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                continue;
            }
            let name = rest[..idx].replace("''", "'");
            let after = rest[idx + 1..].trim_start();
            let value = after.strip_prefix('=').map(str::trim);
            return (name, value);
        }
    }

    match header.split_once('=') {
        Some((name, value)) => (unquote(name.trim()), Some(value.trim())),
        None => (unquote(header), None),
    }
}

fn unquote(name: &str) -> String {
    if name.len() >= 2 && name.starts_with('\'') && name.ends_with('\'') {
        name[1..name.len() - 1].replace("''", "'")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SALES: &str = "\
table Sales
\tlineageTag: 0001

\tmeasure 'Total Sales' = SUM(Sales[Amount])
\t\tformatString: #,0.00
\t\tlineageTag: m-01

\tcolumn OrderDate
\t\tdataType: dateTime
\t\tformatString: General Date
\t\tlineageTag: c-01
\t\tsummarizeBy: none
\t\tannotation SummarizationSetBy = Automatic

\tcolumn Amount
\t\tdataType: double
\t\tsummarizeBy: sum

\tpartition Sales = m
\t\tmode: import
\t\tsource = ```
\t\t\tlet
\t\t\t    Source = Csv.Document(\"sales.csv\")
\t\t\tin
\t\t\t    Source
\t\t\t```

\tannotation PBI_ResultType = Table
";

    #[test]
    fn header_split_handles_quotes() {
        assert_eq!(split_header("'Total Sales' = SUM(x)"), ("Total Sales".to_string(), Some("SUM(x)")));
        assert_eq!(split_header("Plain = 1 = 1"), ("Plain".to_string(), Some("1 = 1")));
        assert_eq!(split_header("'It''s = odd'"), ("It's = odd".to_string(), None));
        assert_eq!(split_header("Amount"), ("Amount".to_string(), None));
    }

    #[test]
    fn parse_table_file() {
        let table = parse_table_source(SALES, "fallback");

        assert_eq!(table.name, "Sales");
        assert_eq!(table.columns.len(), 2);

        let order_date = &table.columns[0];
        assert_eq!(order_date.name, "OrderDate");
        assert_eq!(order_date.data_type, "dateTime");
        assert_eq!(order_date.format_string, "General Date");
        assert_eq!(order_date.lineage_tag, "c-01");
        assert_eq!(
            order_date.annotations.get("SummarizationSetBy").map(String::as_str),
            Some("Automatic")
        );

        assert_eq!(table.columns[1].summarize_by, "sum");
        assert!(table.columns[1].annotations.is_empty());

        assert_eq!(table.measures.len(), 1);
        let measure = &table.measures[0];
        assert_eq!(measure.name, "Total Sales");
        assert_eq!(measure.expression, "SUM(Sales[Amount])");
        assert_eq!(measure.format_string, "#,0.00");
        assert_eq!(measure.lineage_tag, "m-01");
        assert_eq!(measure.table, "Sales");

        assert_eq!(table.partitions.len(), 1);
        assert_eq!(table.partitions[0].name, "Sales");
        assert_eq!(table.partitions[0].mode, "import");
        assert!(table.partitions[0].source.starts_with("let"));
        assert!(table.partitions[0].source.ends_with("Source"));

        assert_eq!(table.annotations.get("PBI_ResultType").map(String::as_str), Some("Table"));
        assert!(!table.annotations.contains_key("SummarizationSetBy"));
    }

    #[test]
    fn multiline_measure_expression() {
        let source = "\
table T
\tmeasure Margin =
\t\t\tVAR s = [Sales]
\t\t\tRETURN s - [Cost]
\t\tformatString: 0%
\t\tannotation Note = x
";
        let table = parse_table_source(source, "T");
        let measure = &table.measures[0];
        assert_eq!(measure.name, "Margin");
        assert_eq!(measure.expression, "VAR s = [Sales]\nRETURN s - [Cost]");
        assert_eq!(measure.format_string, "0%");
        assert_eq!(measure.annotations.get("Note").map(String::as_str), Some("x"));
    }

    #[test]
    fn measure_without_equals_collects_body() {
        let source = "table T\nmeasure Count\nCOUNTROWS(T)\nlineageTag: abc\n";
        let measure = &parse_table_source(source, "T").measures[0];
        assert_eq!(measure.name, "Count");
        assert_eq!(measure.expression, "COUNTROWS(T)");
        assert_eq!(measure.lineage_tag, "abc");
    }

    #[test]
    fn unknown_properties_join_measure_expression() {
        let source = "table T\n\tmeasure M = 1\n\t\tdisplayFolder: KPIs\n";
        let measure = &parse_table_source(source, "T").measures[0];
        assert_eq!(measure.expression, "1\ndisplayFolder: KPIs");
    }

    #[test]
    fn missing_table_declaration_uses_fallback() {
        let table = parse_table_source("column A\n\tdataType: string\n", "FromFile");
        assert_eq!(table.name, "FromFile");
        assert_eq!(table.columns[0].data_type, "string");
    }

    #[test]
    fn column_defaults_when_properties_absent() {
        let table = parse_table_source("table T\n\tcolumn Bare\n", "T");
        let column = &table.columns[0];
        assert_eq!(column.data_type, "");
        assert_eq!(column.format_string, "");
        assert_eq!(column.lineage_tag, "");
        assert_eq!(column.summarize_by, "none");
        assert!(column.annotations.is_empty());
    }

    #[test]
    fn relationships_file() {
        let source = "\
relationship 7f3a
\tfromColumn: 'Sales'.'CustomerID'
\ttoColumn: 'Customer'.'ID'
\tisActive: TRUE
\ttoCardinality: many

relationship 8b21
\tjoinOnDateBehavior: datePartOnly
\tfromColumn: Sales.OrderDate
\ttoColumn: Date.Date
\tisActive: false
";
        let rels = parse_relationships_source(source);
        assert_eq!(rels.len(), 2);

        assert_eq!(rels[0].id, "7f3a");
        assert_eq!(
            rels[0].relationship,
            Relationship::new("Sales", "CustomerID", "Customer", "ID").with_to_cardinality("many")
        );
        assert_eq!(rels[0].join_on_date_behavior, None);

        assert!(!rels[1].relationship.is_active);
        assert_eq!(rels[1].relationship.to_cardinality, None);
        assert_eq!(rels[1].relationship.cross_filtering_behavior, "automatic");
        assert_eq!(rels[1].join_on_date_behavior.as_deref(), Some("datePartOnly"));
    }

    #[test]
    fn column_reference_without_dot() {
        assert_eq!(split_column_ref("Orphan"), (String::new(), String::new()));
        assert_eq!(
            split_column_ref("'Sales Data'.'Order.Id'"),
            ("Sales Data".to_string(), "Order.Id".to_string())
        );
    }

    #[test]
    fn model_file() {
        let source = "\
model Model
\tculture: en-US
\tdefaultPowerBIDataSourceVersion: powerBI_V3
\tsourceQueryCulture: en-GB

annotation __PBI_TimeIntelligenceEnabled = 1

ref table Sales
ref table 'Customer Data'
";
        let info = parse_model_source(source);
        assert_eq!(info.culture, "en-US");
        assert_eq!(info.source_query_culture, "en-GB");
        assert_eq!(info.tables, vec!["Sales".to_string(), "Customer Data".to_string()]);
        assert_eq!(
            info.annotations.get("__PBI_TimeIntelligenceEnabled").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn annotation_closes_measure_body() {
        let source = "\
table T
\tmeasure M =
\t\t\tVAR x = 1
\t\t\tRETURN x
\t\tformatString: 0

\tannotation PBI_Id = 1
\tchangedProperty = Name
\tlineageTag: after
";
        let table = parse_table_source(source, "T");
        let measure = &table.measures[0];
        assert_eq!(measure.expression, "VAR x = 1\nRETURN x");
        assert_eq!(measure.format_string, "0");
        assert_eq!(measure.lineage_tag, "");
        assert_eq!(measure.annotations.get("PBI_Id").map(String::as_str), None);
        assert_eq!(table.annotations.get("PBI_Id").map(String::as_str), Some("1"));
    }

    #[test]
    fn unquoted_measure_name_with_space() {
        let source = "table Sales\n\tmeasure Total Sales = SUM(Sales[Amount])\n";
        let measure = &parse_table_source(source, "Sales").measures[0];
        assert_eq!(measure.name, "Total Sales");
        assert_eq!(measure.expression, "SUM(Sales[Amount])");
    }

    #[test]
    fn doc_comments_stay_out_of_expressions() {
        let source = "table T\n\tmeasure A = 1\n\t/// second measure\n\tmeasure B = 2\n";
        let table = parse_table_source(source, "T");
        assert_eq!(table.measures[0].expression, "1");
        assert_eq!(table.measures[1].expression, "2");
    }
}
