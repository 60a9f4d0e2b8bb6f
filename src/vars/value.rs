//! Runtime values flowing between actions

use crate::document::{Document, NodeId};
use crate::hierarchy::{Branch, HierarchyTree};
use crate::table::{normalize_text, TabularResult};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// A value produced or consumed by an action
///
/// Node values are handles into the document; equality on them is identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Node(NodeId),
    Nodes(Vec<NodeId>),
    Tree(HierarchyTree),
    Branch(Branch),
    Table(TabularResult),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Node(_) => "node",
            Value::Nodes(_) => "node collection",
            Value::Tree(_) => "hierarchy tree",
            Value::Branch(_) => "branch",
            Value::Table(_) => "table",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an iterable value, or `None` when the value is not iterable
    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Nodes(nodes) | Value::Branch(nodes) => {
                Some(nodes.iter().copied().map(Value::Node).collect())
            }
            Value::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// One step of `$name.a.b` access
    ///
    /// Mappings are indexed by key, sequences by position, and nodes by
    /// attribute name (or `text` for their text content).
    pub fn field(&self, doc: &dyn Document, segment: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(segment).cloned(),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            Value::Nodes(nodes) | Value::Branch(nodes) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| nodes.get(i).copied().map(Value::Node)),
            Value::Node(node) if segment == "text" => Some(Value::Str(doc.text(*node))),
            Value::Node(node) => doc.attr(*node, segment).map(|v| Value::Str(v.to_string())),
            _ => None,
        }
    }

    /// Render the value as a single table cell
    pub fn to_cell(&self, doc: &dyn Document) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Node(node) => normalize_text(&doc.text(*node)),
            other => other.to_json(doc).to_string(),
        }
    }

    /// Render the value as JSON, replacing node handles with their text
    pub fn to_json(&self, doc: &dyn Document) -> serde_json::Value {
        let node_text = |node: &NodeId| json!(normalize_text(&doc.text(*node)));
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Str(s) => json!(s),
            Value::Node(node) => node_text(node),
            Value::Nodes(nodes) | Value::Branch(nodes) => {
                serde_json::Value::Array(nodes.iter().map(node_text).collect())
            }
            Value::Tree(tree) => tree.to_json(doc),
            Value::Table(table) => json!({ "header": table.header, "rows": table.rows }),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(|item| item.to_json(doc)).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json(doc)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Node(node) => write!(f, "node {node}"),
            Value::Nodes(nodes) => write!(f, "{} nodes", nodes.len()),
            Value::Tree(tree) => write!(f, "tree with {} top-level entries", tree.entries().len()),
            Value::Branch(branch) => write!(f, "branch of {} nodes", branch.len()),
            Value::Table(table) => write!(f, "table with {} rows", table.rows.len()),
            Value::List(items) => write!(f, "list of {} items", items.len()),
            Value::Map(map) => write!(f, "mapping with {} keys", map.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NodeId> for Value {
    fn from(node: NodeId) -> Self {
        Value::Node(node)
    }
}
