//! Index arena implementation of [`Document`]
//!
//! Nodes are appended in pre-order, so a node's descendants occupy the
//! contiguous index range right after it. Queries are range scans.

use super::{AttrFilter, Document, NodeId};

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    children: Vec<NodeId>,
    /// One past the index of the last descendant
    end: usize,
}

/// A parsed document stored as a flat pre-order arena
#[derive(Debug, Clone)]
pub struct ArenaDocument {
    nodes: Vec<NodeEntry>,
}

impl ArenaDocument {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// Number of element nodes, including the synthetic root
    pub fn element_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|entry| matches!(entry.data, NodeData::Element { .. }))
            .count()
    }

    fn entry(&self, node: NodeId) -> &NodeEntry {
        &self.nodes[node.0]
    }

    fn is_element(&self, index: usize) -> bool {
        matches!(self.nodes[index].data, NodeData::Element { .. })
    }
}

impl Document for ArenaDocument {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn node_type(&self, node: NodeId) -> &str {
        match &self.entry(node).data {
            NodeData::Element { tag, .. } => tag,
            NodeData::Text(_) => "#text",
        }
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.entry(node).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> String {
        let entry = self.entry(node);
        if let NodeData::Text(text) = &entry.data {
            return text.clone();
        }
        self.nodes[node.0 + 1..entry.end]
            .iter()
            .filter_map(|descendant| match &descendant.data {
                NodeData::Text(text) => Some(text.as_str()),
                NodeData::Element { .. } => None,
            })
            .collect()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.entry(node)
            .children
            .iter()
            .copied()
            .filter(|child| self.is_element(child.0))
            .collect()
    }

    fn find_all(&self, scope: NodeId, node_type: &str, filter: &AttrFilter) -> Vec<NodeId> {
        (scope.0 + 1..self.entry(scope).end)
            .map(NodeId)
            .filter(|node| self.is_element(node.0) && self.matches(*node, node_type, filter))
            .collect()
    }

    fn flatten_following(&self, node: NodeId) -> Vec<NodeId> {
        (node.0 + 1..self.nodes.len())
            .filter(|index| self.is_element(*index))
            .map(NodeId)
            .collect()
    }
}

/// Incremental builder producing an [`ArenaDocument`]
///
/// Used by the markup loader and by tests to assemble documents by hand.
#[derive(Debug)]
pub struct DocumentBuilder {
    nodes: Vec<NodeEntry>,
    open: Vec<NodeId>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let root = NodeEntry {
            data: NodeData::Element {
                tag: "#document".to_string(),
                attrs: Vec::new(),
            },
            children: Vec::new(),
            end: 1,
        };
        Self {
            nodes: vec![root],
            open: vec![NodeId(0)],
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(parent) = self.open.last() {
            self.nodes[parent.0].children.push(id);
        }
        self.nodes.push(NodeEntry {
            data,
            children: Vec::new(),
            end: id.0 + 1,
        });
        id
    }

    /// Open an element; following nodes become its descendants until closed
    pub fn open<I, K, V>(&mut self, tag: &str, attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let attrs = attrs
            .into_iter()
            .map(|(key, value)| (key.into().to_ascii_lowercase(), value.into()))
            .collect();
        let id = self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs,
        });
        self.open.push(id);
        id
    }

    /// Append a text node to the innermost open element
    pub fn text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    /// Append a complete element holding only text
    pub fn element<I, K, V>(&mut self, tag: &str, attrs: I, text: &str) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let id = self.open(tag, attrs);
        if !text.is_empty() {
            self.text(text);
        }
        self.close();
        id
    }

    /// Close the innermost open element; the root is never closed here
    pub fn close(&mut self) -> Option<NodeId> {
        if self.open.len() <= 1 {
            return None;
        }
        let id = self.open.pop()?;
        self.nodes[id.0].end = self.nodes.len();
        Some(id)
    }

    /// Close elements up to and including the innermost open `tag`
    ///
    /// Returns false, closing nothing, when no such element is open.
    pub fn close_tag(&mut self, tag: &str) -> bool {
        let position = self.open.iter().skip(1).rposition(|id| {
            matches!(&self.nodes[id.0].data, NodeData::Element { tag: open, .. } if open.eq_ignore_ascii_case(tag))
        });
        let Some(position) = position else {
            return false;
        };
        // `position` counts from the element after the root
        while self.open.len() > position + 1 {
            self.close();
        }
        true
    }

    /// Tags still open, innermost last, excluding the root
    pub fn open_depth(&self) -> usize {
        self.open.len() - 1
    }

    pub fn finish(mut self) -> ArenaDocument {
        while self.close().is_some() {}
        self.nodes[0].end = self.nodes.len();
        ArenaDocument { nodes: self.nodes }
    }
}
