//! Read-only document capability consumed by the interpreter
//!
//! The interpreter never walks markup directly. Everything it needs from a
//! parsed page goes through the [`Document`] trait: node types, attributes,
//! text, descendant queries, and the document-order list of elements that
//! follow a node. [`ArenaDocument`] is the shipped implementation; it stores
//! nodes in pre-order in a flat arena and hands out [`NodeId`] indices.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::error::{describe_error_code, ErrorCode};

pub mod arena;
pub mod xml;

pub use arena::{ArenaDocument, DocumentBuilder};
pub use xml::{load_document, parse_document};

/// Handle to a node in a document arena
///
/// Two handles are equal exactly when they name the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in document order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attribute constraints for node queries
///
/// All pairs must match. The `class` attribute matches when the value is one
/// of the node's whitespace-separated class tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrFilter {
    pairs: Vec<(String, String)>,
}

impl AttrFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to equal `value`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Filter on `id`, falling back to `class` when no id is given
    ///
    /// Mirrors how flow files address elements: an id wins over a class.
    pub fn id_or_class(id: Option<&str>, class: Option<&str>) -> Self {
        match (id, class) {
            (Some(id), _) => Self::new().with("id", id),
            (None, Some(class)) => Self::new().with("class", class),
            (None, None) => Self::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Check a single attribute lookup against the filter
    pub fn accepts<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.pairs.iter().all(|(name, expected)| match lookup(name) {
            Some(actual) if name == "class" => {
                actual.split_whitespace().any(|token| token == expected)
            }
            Some(actual) => actual == expected,
            None => false,
        })
    }
}

impl fmt::Display for AttrFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pairs.is_empty() {
            return write!(f, "(any)");
        }
        let rendered: Vec<String> = self
            .pairs
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

/// Node capability over a parsed document
///
/// Only element nodes are visible through this trait; text is reachable
/// through [`Document::text`].
pub trait Document: Send + Sync {
    /// The synthetic root that contains every top-level element
    fn root(&self) -> NodeId;

    /// Element type name, lowercased (e.g. `table`, `h2`)
    fn node_type(&self, node: NodeId) -> &str;

    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Concatenated text of all descendant text nodes, in document order
    fn text(&self, node: NodeId) -> String;

    /// Element children in document order
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// All descendants of `scope` with the given type that pass `filter`
    fn find_all(&self, scope: NodeId, node_type: &str, filter: &AttrFilter) -> Vec<NodeId>;

    /// Every element after `node` in document order
    ///
    /// Includes the node's own descendants and everything that follows its
    /// subtree, up to the end of the document.
    fn flatten_following(&self, node: NodeId) -> Vec<NodeId>;

    fn find_one(&self, scope: NodeId, node_type: &str, filter: &AttrFilter) -> Option<NodeId> {
        self.find_all(scope, node_type, filter).into_iter().next()
    }

    /// Check type and attribute constraints on a single node
    fn matches(&self, node: NodeId, node_type: &str, filter: &AttrFilter) -> bool {
        self.node_type(node).eq_ignore_ascii_case(node_type)
            && filter.accepts(|name| self.attr(node, name))
    }
}

/// Errors raised while loading a document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("[E{code:04}] failed to read document {}", .path.display(), code = ErrorCode::DOC_GENERIC)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "[E{code:04}] malformed markup at byte {position}: {source}",
        code = ErrorCode::DOC_PARSE_FAILED
    )]
    Markup {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("[E{code:04}] malformed attribute: {0}", code = ErrorCode::DOC_PARSE_FAILED)]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
}

impl DocumentError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Io { .. } => ErrorCode::DOC_GENERIC,
            Self::Markup { .. } | Self::Attribute(_) => ErrorCode::DOC_PARSE_FAILED,
        }
    }

    pub fn exit_code(&self) -> i32 {
        3
    }

    pub fn user_message(&self) -> String {
        format!("{}: {}", describe_error_code(self.code()), self)
    }
}
