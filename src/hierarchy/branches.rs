//! Depth-first enumeration of root-to-leaf paths

use super::{HierarchyTree, TreeEntry};
use crate::document::NodeId;

/// Keys from the root down to one leaf, ending with the leaf itself
pub type Branch = Vec<NodeId>;

struct Frame<'a> {
    entries: &'a [TreeEntry],
    entry: usize,
    leaf: usize,
}

/// Iterator over every branch of a [`HierarchyTree`]
///
/// Walks with an explicit stack, so tree depth is bounded by memory rather
/// than the call stack. Keys without leaves yield nothing.
pub struct Branches<'a> {
    stack: Vec<Frame<'a>>,
    path: Vec<NodeId>,
}

impl<'a> Branches<'a> {
    pub fn new(tree: &'a HierarchyTree) -> Self {
        Self {
            stack: vec![Frame {
                entries: tree.entries(),
                entry: 0,
                leaf: 0,
            }],
            path: Vec::new(),
        }
    }
}

impl Iterator for Branches<'_> {
    type Item = Branch;

    fn next(&mut self) -> Option<Branch> {
        loop {
            let frame = self.stack.last_mut()?;
            let entries = frame.entries;
            let Some(entry) = entries.get(frame.entry) else {
                self.stack.pop();
                if !self.stack.is_empty() {
                    self.path.pop();
                }
                continue;
            };
            match entry {
                TreeEntry::Leaf(leaves) => {
                    if let Some(&leaf) = leaves.get(frame.leaf) {
                        frame.leaf += 1;
                        let mut branch = self.path.clone();
                        branch.push(leaf);
                        return Some(branch);
                    }
                    frame.entry += 1;
                    frame.leaf = 0;
                }
                TreeEntry::Child { key, subtree } => {
                    frame.entry += 1;
                    self.path.push(*key);
                    self.stack.push(Frame {
                        entries: subtree.entries(),
                        entry: 0,
                        leaf: 0,
                    });
                }
            }
        }
    }
}
