//! Tabular projection of table markup and hierarchy branches

use crate::document::{AttrFilter, Document, NodeId};
use crate::error::{FlowError, Result};
use crate::vars::{ExecutionContext, ValueSource};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

/// `[N]` anywhere in a column value selects the Nth element of a branch
static BRANCH_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("Invalid regex pattern"));

/// A header row plus data rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabularResult {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Column prepended to every row with a fixed (or resolved) value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantColumn {
    pub name: String,
    pub source: ValueSource,
}

impl ConstantColumn {
    pub fn new(name: impl Into<String>, source: ValueSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Branch element index when the source contains `[N]`
    pub fn branch_index(&self) -> Option<usize> {
        match &self.source {
            ValueSource::Literal(text) => BRANCH_INDEX
                .captures(text)
                .and_then(|caps| caps[1].parse().ok()),
            _ => None,
        }
    }
}

/// Trim, drop double quotes and collapse internal whitespace
pub fn normalize_text(text: &str) -> String {
    text.replace('"', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn header_cell(text: &str) -> String {
    normalize_text(text).replace(' ', "_")
}

/// Resolve constant columns into `(name, value)` pairs
pub fn resolve_constants(
    ctx: &mut ExecutionContext,
    doc: &dyn Document,
    columns: &[ConstantColumn],
) -> Result<Vec<(String, String)>> {
    columns
        .iter()
        .map(|column| {
            let value = ctx.resolve(&column.source, doc)?;
            Ok((column.name.clone(), value.to_cell(doc)))
        })
        .collect()
}

/// Locate a table at or under `source`
fn locate_table(doc: &dyn Document, source: NodeId, filter: &AttrFilter) -> Result<NodeId> {
    if doc.matches(source, "table", filter) {
        return Ok(source);
    }
    doc.find_one(source, "table", filter)
        .ok_or_else(|| FlowError::NotTabular {
            node_type: doc.node_type(source).to_string(),
        })
}

/// Project table markup into rows
///
/// The first `tr` becomes the header (cell text with spaces replaced by `_`),
/// later rows become data. Constants are prepended to the header and to every
/// row. With `enforce`, rows whose `td` count differs are dropped.
pub fn project_table(
    doc: &dyn Document,
    source: NodeId,
    filter: &AttrFilter,
    constants: &[(String, String)],
    enforce: Option<usize>,
) -> Result<TabularResult> {
    let table = locate_table(doc, source, filter)?;
    let rows = doc.find_all(table, "tr", &AttrFilter::new());

    let mut header: Vec<String> = constants.iter().map(|(name, _)| name.clone()).collect();
    let Some((first, data)) = rows.split_first() else {
        warn!("Table {} has no rows", table);
        return Ok(TabularResult::new(header));
    };
    header.extend(doc.children(*first).into_iter().map(|cell| header_cell(&doc.text(cell))));

    let mut result = TabularResult::new(header);
    let mut dropped = 0usize;
    for row in data {
        let cells = doc.children(*row);
        if enforce.is_some_and(|expected| data_cell_count(doc, &cells) != expected) {
            dropped += 1;
            continue;
        }
        let mut values: Vec<String> = constants.iter().map(|(_, value)| value.clone()).collect();
        values.extend(cells.into_iter().map(|cell| normalize_text(&doc.text(cell))));
        result.rows.push(values);
    }
    debug!(
        "Projected {} rows from table {} ({} dropped by column count)",
        result.rows.len(),
        table,
        dropped
    );
    Ok(result)
}

fn data_cell_count(doc: &dyn Document, cells: &[NodeId]) -> usize {
    cells
        .iter()
        .filter(|cell| doc.node_type(**cell).eq_ignore_ascii_case("td"))
        .count()
}

/// Project one hierarchy branch
///
/// Constant columns containing `[N]` take the text of the branch's Nth node.
/// With `table_index`, that branch element must be a `table` and is projected
/// like [`project_table`]. Without it, the branch becomes a single
/// row: constants followed by the text of each branch element, under a header
/// of the constant names followed by the element types.
pub fn project_branch(
    ctx: &mut ExecutionContext,
    doc: &dyn Document,
    branch: &[NodeId],
    table_index: Option<usize>,
    columns: &[ConstantColumn],
) -> Result<TabularResult> {
    let mut constants = Vec::with_capacity(columns.len());
    for column in columns {
        let value = match column.branch_index() {
            Some(index) => {
                let node = branch.get(index).ok_or_else(|| FlowError::ColumnIndexOutOfRange {
                    column: column.name.clone(),
                    index,
                    len: branch.len(),
                })?;
                normalize_text(&doc.text(*node))
            }
            None => ctx.resolve(&column.source, doc)?.to_cell(doc),
        };
        constants.push((column.name.clone(), value));
    }

    match table_index {
        Some(index) => {
            let node = branch.get(index).ok_or_else(|| FlowError::ColumnIndexOutOfRange {
                column: "idxOfHtmlTable".to_string(),
                index,
                len: branch.len(),
            })?;
            if !doc.node_type(*node).eq_ignore_ascii_case("table") {
                return Err(FlowError::NotTabular {
                    node_type: doc.node_type(*node).to_string(),
                });
            }
            project_table(doc, *node, &AttrFilter::new(), &constants, None)
        }
        None => {
            let mut header: Vec<String> = constants.iter().map(|(name, _)| name.clone()).collect();
            header.extend(branch.iter().map(|node| doc.node_type(*node).to_string()));
            let mut row: Vec<String> = constants.into_iter().map(|(_, value)| value).collect();
            row.extend(branch.iter().map(|node| normalize_text(&doc.text(*node))));
            Ok(TabularResult {
                header,
                rows: vec![row],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse_document, ArenaDocument, DocumentBuilder};
    use crate::vars::{Value, VarKind};

    const NO_ATTRS: [(&str, &str); 0] = [];

    fn people() -> ArenaDocument {
        parse_document(
            r#"<div id="wrap"><table id="t1">
                <tr><th>Name</th><th>Age</th></tr>
                <tr><td>Bob</td><td>30</td></tr>
            </table></div>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  \"On  Demand\"\n price "), "On Demand price");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_project_table_with_constants() {
        let doc = people();
        let constants = vec![("Service".to_string(), "Compute".to_string())];
        let result = project_table(
            &doc,
            doc.root(),
            &AttrFilter::new().with("id", "t1"),
            &constants,
            None,
        )
        .unwrap();
        assert_eq!(result.header, vec!["Service", "Name", "Age"]);
        assert_eq!(result.rows, vec![vec!["Compute", "Bob", "30"]]);
    }

    #[test]
    fn test_header_spaces_become_underscores() {
        let doc = parse_document("<table><tr><th> Price  per hour </th></tr></table>").unwrap();
        let result = project_table(&doc, doc.root(), &AttrFilter::new(), &[], None).unwrap();
        assert_eq!(result.header, vec!["Price_per_hour"]);
    }

    #[test]
    fn test_enforced_column_count_drops_rows() {
        let doc = parse_document(
            "<table><tr><th>a</th><th>b</th><th>c</th></tr>\
             <tr><td>1</td><td>2</td><td>3</td></tr>\
             <tr><td>4</td><td>5</td></tr>\
             <tr><td>6</td><td>7</td><td>8</td></tr></table>",
        )
        .unwrap();
        let result = project_table(&doc, doc.root(), &AttrFilter::new(), &[], Some(3)).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1], vec!["6", "7", "8"]);
    }

    #[test]
    fn test_enforcement_counts_data_cells_only() {
        let doc = parse_document(
            "<table><tr><th>region</th><th>a</th><th>b</th></tr>\
             <tr><th>us-east-1</th><td>1</td><td>2</td></tr>\
             <tr><td>x</td><td>3</td><td>4</td></tr></table>",
        )
        .unwrap();
        let result = project_table(&doc, doc.root(), &AttrFilter::new(), &[], Some(2)).unwrap();
        assert_eq!(result.rows, vec![vec!["us-east-1", "1", "2"]]);
    }

    #[test]
    fn test_non_table_source_is_not_tabular() {
        let mut builder = DocumentBuilder::new();
        let div = builder.element("div", NO_ATTRS, "no table here");
        let doc = builder.finish();
        let err = project_table(&doc, div, &AttrFilter::new(), &[], None).unwrap_err();
        assert!(matches!(err, FlowError::NotTabular { ref node_type } if node_type == "div"));
    }

    #[test]
    fn test_branch_index_columns() {
        let mut builder = DocumentBuilder::new();
        let h2 = builder.element("h2", NO_ATTRS, "Compute");
        let h3 = builder.element("h3", NO_ATTRS, "EC2");
        let leaf = builder.element("div", NO_ATTRS, "t2.micro");
        let doc = builder.finish();
        let mut ctx = ExecutionContext::new();
        ctx.declare("ServiceName", VarKind::Scalar, Some(Value::from("aws")));

        let columns = vec![
            ConstantColumn::new("provider", ValueSource::parse("$ServiceName")),
            ConstantColumn::new("section", ValueSource::parse("[0]")),
        ];
        let result = project_branch(&mut ctx, &doc, &[h2, h3, leaf], None, &columns).unwrap();
        assert_eq!(result.header, vec!["provider", "section", "h2", "h3", "div"]);
        assert_eq!(result.rows, vec![vec!["aws", "Compute", "Compute", "EC2", "t2.micro"]]);

        let out_of_range = vec![ConstantColumn::new("deep", ValueSource::parse("[5]"))];
        let err = project_branch(&mut ctx, &doc, &[h2, h3], None, &out_of_range).unwrap_err();
        assert!(matches!(
            err,
            FlowError::ColumnIndexOutOfRange { index: 5, len: 2, .. }
        ));
    }

    #[test]
    fn test_branch_with_table_element() {
        let doc = parse_document(
            "<h2>Storage</h2><table><tr><th>Tier</th></tr><tr><td>Standard</td></tr></table>",
        )
        .unwrap();
        let h2 = doc.find_one(doc.root(), "h2", &AttrFilter::new()).unwrap();
        let table = doc.find_one(doc.root(), "table", &AttrFilter::new()).unwrap();
        let mut ctx = ExecutionContext::new();
        let columns = vec![ConstantColumn::new("section", ValueSource::parse("[0]"))];
        let result = project_branch(&mut ctx, &doc, &[h2, table], Some(1), &columns).unwrap();
        assert_eq!(result.header, vec!["section", "Tier"]);
        assert_eq!(result.rows, vec![vec!["Storage", "Standard"]]);
    }

    #[test]
    fn test_embedded_branch_index() {
        let doc = parse_document(
            "<h2>Storage</h2><table><tr><th>Tier</th></tr><tr><td>Standard</td></tr></table>",
        )
        .unwrap();
        let h2 = doc.find_one(doc.root(), "h2", &AttrFilter::new()).unwrap();
        let table = doc.find_one(doc.root(), "table", &AttrFilter::new()).unwrap();
        let column = ConstantColumn::new("section", ValueSource::parse("branch[0]"));
        assert_eq!(column.branch_index(), Some(0));

        let mut ctx = ExecutionContext::new();
        let result = project_branch(&mut ctx, &doc, &[h2, table], Some(1), &[column]).unwrap();
        assert_eq!(result.rows, vec![vec!["Storage", "Standard"]]);
    }

    #[test]
    fn test_branch_table_element_must_be_a_table() {
        let doc = parse_document(
            "<h2>Storage</h2><div id=\"wrap\"><table><tr><th>Tier</th></tr></table></div>",
        )
        .unwrap();
        let h2 = doc.find_one(doc.root(), "h2", &AttrFilter::new()).unwrap();
        let wrap = doc.find_one(doc.root(), "div", &AttrFilter::new()).unwrap();
        let mut ctx = ExecutionContext::new();
        let err = project_branch(&mut ctx, &doc, &[h2, wrap], Some(1), &[]).unwrap_err();
        assert!(matches!(err, FlowError::NotTabular { ref node_type } if node_type == "div"));
    }
}
