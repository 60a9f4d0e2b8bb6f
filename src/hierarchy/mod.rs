//! Heading-style hierarchy extraction
//!
//! Flat markup such as `h2, h3, div, h3, div, h2, ...` is folded into a tree
//! using a level per node type. The tree is keyed by node handles and keeps at
//! most one leaf list per subtree.

use crate::document::{AttrFilter, Document, NodeId};
use crate::error::{FlowError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

pub mod branches;

pub use branches::{Branch, Branches};

/// Level assignment per node type
///
/// The highest level is the leaf level. Types are compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSpec {
    levels: HashMap<String, usize>,
}

impl LevelSpec {
    /// Build from a dot-separated type path such as `h2.h3.div`
    pub fn from_path(relations: &str) -> Self {
        Self::from_pairs(
            relations
                .split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .enumerate()
                .map(|(level, node_type)| (node_type.to_string(), level)),
        )
    }

    /// Build from explicit `(type, level)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: AsRef<str>,
    {
        let levels = pairs
            .into_iter()
            .map(|(node_type, level)| (node_type.as_ref().to_ascii_lowercase(), level))
            .collect();
        Self { levels }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_of(&self, node_type: &str) -> Option<usize> {
        self.levels.get(&node_type.to_ascii_lowercase()).copied()
    }

    pub fn leaf_level(&self) -> usize {
        self.levels.values().copied().max().unwrap_or(0)
    }
}

/// A node type plus attribute filter delimiting the scanned range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub node_type: String,
    pub filter: AttrFilter,
}

impl Marker {
    pub fn new(node_type: impl Into<String>, filter: AttrFilter) -> Self {
        Self {
            node_type: node_type.into(),
            filter,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {}", self.node_type, self.filter)
    }
}

/// One entry of a [`HierarchyTree`], in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    Child { key: NodeId, subtree: HierarchyTree },
    Leaf(Vec<NodeId>),
}

/// Ordered tree of heading nodes with leaf lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyTree {
    entries: Vec<TreeEntry>,
}

impl HierarchyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-leaf keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            TreeEntry::Child { key, .. } => Some(*key),
            TreeEntry::Leaf(_) => None,
        })
    }

    pub fn get(&self, key: NodeId) -> Option<&HierarchyTree> {
        self.entries.iter().find_map(|entry| match entry {
            TreeEntry::Child { key: k, subtree } if *k == key => Some(subtree),
            _ => None,
        })
    }

    /// The leaf list of this subtree, empty when it has none
    pub fn leaf(&self) -> &[NodeId] {
        self.entries
            .iter()
            .find_map(|entry| match entry {
                TreeEntry::Leaf(nodes) => Some(nodes.as_slice()),
                TreeEntry::Child { .. } => None,
            })
            .unwrap_or(&[])
    }

    /// Nesting depth; a tree holding only a leaf list has depth 1
    pub fn depth(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                TreeEntry::Child { subtree, .. } => 1 + subtree.depth(),
                TreeEntry::Leaf(_) => 1,
            })
            .max()
            .unwrap_or(0)
    }

    /// Iterate root-to-leaf paths in depth-first order
    pub fn branches(&self) -> Branches<'_> {
        Branches::new(self)
    }

    fn insert(&mut self, key: NodeId, subtree: HierarchyTree) {
        self.entries.push(TreeEntry::Child { key, subtree });
    }

    fn push_leaf(&mut self, node: NodeId) {
        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            TreeEntry::Leaf(nodes) => Some(nodes),
            TreeEntry::Child { .. } => None,
        });
        match existing {
            Some(nodes) => nodes.push(node),
            None => self.entries.push(TreeEntry::Leaf(vec![node])),
        }
    }

    /// Render as nested JSON objects with node text in place of handles
    pub fn to_json(&self, doc: &dyn Document) -> serde_json::Value {
        let text = |node: NodeId| crate::table::normalize_text(&doc.text(node));
        let children: Vec<serde_json::Value> = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                TreeEntry::Child { key, subtree } => {
                    let mut rendered = subtree.to_json(doc);
                    if let Some(object) = rendered.as_object_mut() {
                        object.insert("type".to_string(), json!(doc.node_type(*key)));
                        object.insert("text".to_string(), json!(text(*key)));
                    }
                    Some(rendered)
                }
                TreeEntry::Leaf(_) => None,
            })
            .collect();
        let leaf: Vec<String> = self.leaf().iter().map(|node| text(*node)).collect();
        json!({ "children": children, "leaf": leaf })
    }
}

/// Fold the elements following `root` into a [`HierarchyTree`]
///
/// The scan starts at the first element matching `start` (inclusive) and stops
/// before the first element at or after it matching `end`. Elements whose type has
/// no level are skipped.
pub fn build_tree(
    doc: &dyn Document,
    root: NodeId,
    start: Option<&Marker>,
    end: Option<&Marker>,
    levels: &LevelSpec,
) -> Result<HierarchyTree> {
    let elements = doc.flatten_following(root);

    let start_index = match start {
        Some(marker) => find_marker(doc, &elements, marker, 0)?,
        None => 0,
    };
    let end_index = match end {
        Some(marker) => find_marker(doc, &elements, marker, start_index)?,
        None => elements.len(),
    };
    debug!(
        "Building hierarchy over elements {}..{} of {}",
        start_index,
        end_index,
        elements.len()
    );

    let mut walker = Walker {
        doc,
        levels,
        leaf_level: levels.leaf_level(),
        elements: &elements[start_index..end_index],
        cursor: 0,
    };
    Ok(walker.subtree(None))
}

fn find_marker(
    doc: &dyn Document,
    elements: &[NodeId],
    marker: &Marker,
    from: usize,
) -> Result<usize> {
    elements
        .iter()
        .skip(from)
        .position(|node| doc.matches(*node, &marker.node_type, &marker.filter))
        .map(|offset| from + offset)
        .ok_or_else(|| FlowError::MarkerNotFound {
            marker: marker.to_string(),
        })
}

struct Walker<'a> {
    doc: &'a dyn Document,
    levels: &'a LevelSpec,
    leaf_level: usize,
    elements: &'a [NodeId],
    cursor: usize,
}

impl Walker<'_> {
    /// Consume elements into a subtree owned by a node at `owner_level`
    ///
    /// Returns without consuming the first element whose level is not deeper
    /// than the owner.
    fn subtree(&mut self, owner_level: Option<usize>) -> HierarchyTree {
        let mut tree = HierarchyTree::new();
        while let Some(&node) = self.elements.get(self.cursor) {
            let Some(level) = self.levels.level_of(self.doc.node_type(node)) else {
                self.cursor += 1;
                continue;
            };
            if owner_level.is_some_and(|owner| level <= owner) {
                return tree;
            }
            self.cursor += 1;
            if level == self.leaf_level {
                trace!("Leaf {} at level {}", node, level);
                tree.push_leaf(node);
            } else {
                let child = self.subtree(Some(level));
                tree.insert(node, child);
            }
        }
        tree
    }
}
