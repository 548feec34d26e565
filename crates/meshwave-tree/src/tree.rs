//! Whole-network view of a finished run
//!
//! Every node only knows its own parent and children. [`SpanningTree`]
//! stitches the per-node snapshots together so a finished run can be checked
//! and printed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use meshwave_core::NodeId;
use thiserror::Error;

use crate::builder::TreeSnapshot;

/// Ways a set of snapshots fails to form a spanning tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Expected exactly one root, found {0}")]
    RootCount(usize),

    #[error("{0} has not finished")]
    Unfinished(NodeId),

    #[error("{0} never joined the tree")]
    Orphan(NodeId),

    #[error("{child} names {parent} as parent, but {parent} does not list it as a child")]
    InconsistentEdge { parent: NodeId, child: NodeId },

    #[error("Parent pointers from {0} form a cycle")]
    Cycle(NodeId),
}

/// Parent pointers of a complete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningTree {
    root: NodeId,
    parents: BTreeMap<NodeId, NodeId>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl SpanningTree {
    /// Assemble and validate a tree from every node's snapshot
    pub fn from_snapshots(snapshots: &BTreeMap<NodeId, TreeSnapshot>) -> Result<Self, TreeError> {
        let roots: Vec<_> = snapshots
            .iter()
            .filter(|(_, s)| s.is_root)
            .map(|(id, _)| *id)
            .collect();
        let [root] = roots[..] else {
            return Err(TreeError::RootCount(roots.len()));
        };

        let mut parents = BTreeMap::new();
        let mut children = BTreeMap::new();

        for (&id, snapshot) in snapshots {
            if !snapshot.is_done() {
                return Err(TreeError::Unfinished(id));
            }
            children.insert(id, snapshot.children.clone());

            if id == root {
                continue;
            }
            let parent = snapshot.parent.ok_or(TreeError::Orphan(id))?;
            let acknowledged = snapshots
                .get(&parent)
                .is_some_and(|p| p.children.contains(&id));
            if !acknowledged {
                return Err(TreeError::InconsistentEdge { parent, child: id });
            }
            parents.insert(id, parent);
        }

        // Walk each node up to the root; more steps than nodes means a cycle
        for &start in parents.keys() {
            let mut current = start;
            let mut steps = 0;
            while let Some(&next) = parents.get(&current) {
                steps += 1;
                if steps > parents.len() {
                    return Err(TreeError::Cycle(start));
                }
                current = next;
            }
        }

        Ok(Self {
            root,
            parents,
            children,
        })
    }

    /// The root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Parent of `node`, `None` for the root or unknown nodes
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }

    /// Children of `node`
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children.get(&node).into_iter().flatten().copied()
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    /// Always false: a tree holds at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Hops from `node` to the root
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(&parent) = self.parents.get(&current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    fn render(&self, f: &mut std::fmt::Formatter<'_>, node: NodeId, indent: usize) -> std::fmt::Result {
        writeln!(f, "{:indent$}{}", "", node, indent = indent * 2)?;
        for child in self.children(node) {
            self.render(f, child, indent + 1)?;
        }
        Ok(())
    }
}

impl Display for SpanningTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render(f, self.root, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreePhase;

    fn snapshot(is_root: bool, parent: Option<u32>, children: &[u32]) -> TreeSnapshot {
        TreeSnapshot {
            phase: TreePhase::Done,
            is_root,
            parent: parent.map(NodeId),
            children: children.iter().copied().map(NodeId).collect(),
            rejected_by: BTreeSet::new(),
        }
    }

    fn line() -> BTreeMap<NodeId, TreeSnapshot> {
        BTreeMap::from([
            (NodeId(1), snapshot(true, None, &[2])),
            (NodeId(2), snapshot(false, Some(1), &[3])),
            (NodeId(3), snapshot(false, Some(2), &[])),
        ])
    }

    #[test]
    fn test_valid_line() {
        let tree = SpanningTree::from_snapshots(&line()).unwrap();
        assert_eq!(tree.root(), NodeId(1));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.parent(NodeId(3)), Some(NodeId(2)));
        assert_eq!(tree.depth(NodeId(3)), 2);
        assert_eq!(tree.children(NodeId(1)).collect::<Vec<_>>(), vec![NodeId(2)]);
        assert_eq!(tree.to_string(), "node-1\n  node-2\n    node-3\n");
    }

    #[test]
    fn test_missing_root() {
        let mut snapshots = line();
        snapshots.insert(NodeId(1), snapshot(false, Some(2), &[2]));
        assert_eq!(
            SpanningTree::from_snapshots(&snapshots),
            Err(TreeError::RootCount(0))
        );
    }

    #[test]
    fn test_unacknowledged_parent() {
        let mut snapshots = line();
        snapshots.insert(NodeId(2), snapshot(false, Some(1), &[]));
        assert_eq!(
            SpanningTree::from_snapshots(&snapshots),
            Err(TreeError::InconsistentEdge {
                parent: NodeId(2),
                child: NodeId(3)
            })
        );
    }

    #[test]
    fn test_cycle_detected() {
        let snapshots = BTreeMap::from([
            (NodeId(1), snapshot(true, None, &[])),
            (NodeId(2), snapshot(false, Some(3), &[3])),
            (NodeId(3), snapshot(false, Some(2), &[2])),
        ]);
        assert!(matches!(
            SpanningTree::from_snapshots(&snapshots),
            Err(TreeError::Cycle(_))
        ));
    }

    #[test]
    fn test_unfinished_node() {
        let mut snapshots = line();
        snapshots.get_mut(&NodeId(3)).unwrap().phase = TreePhase::Active;
        assert_eq!(
            SpanningTree::from_snapshots(&snapshots),
            Err(TreeError::Unfinished(NodeId(3)))
        );
    }
}
