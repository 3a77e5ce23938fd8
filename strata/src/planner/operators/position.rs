/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::PlanNode;
use crate::error::{QueryError, Result};
use std::sync::Arc;

/// A node within a tree, addressed by the input indexes leading to it from
/// the root. Nodes carry no parent pointers; parents are found through the
/// root and the path.
#[derive(Debug)]
pub struct Position<N: PlanNode> {
    root: Arc<N>,
    path: Vec<usize>,
    node: Arc<N>,
}

impl<N: PlanNode> Clone for Position<N> {
    fn clone(&self) -> Self {
        Position {
            root: self.root.clone(),
            path: self.path.clone(),
            node: self.node.clone(),
        }
    }
}

impl<N: PlanNode> Position<N> {
    /// The position of the root of a tree.
    pub fn root(root: Arc<N>) -> Self {
        Position {
            node: root.clone(),
            root,
            path: Vec::new(),
        }
    }

    /// Follows `path` down from `root`.
    pub fn at(root: Arc<N>, path: &[usize]) -> Result<Self> {
        let mut node = root.clone();
        for &index in path {
            let next = node.inputs().get(index).cloned().ok_or_else(|| {
                QueryError::internal(format!(
                    "path {:?} does not exist below {}",
                    path,
                    root.name()
                ))
            })?;
            node = next;
        }
        Ok(Position {
            root,
            path: path.to_vec(),
            node,
        })
    }

    pub fn node(&self) -> &Arc<N> {
        &self.node
    }

    /// Root of the tree this position belongs to.
    pub fn tree(&self) -> &Arc<N> {
        &self.root
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Index of this node among its parent's inputs.
    pub fn input_index(&self) -> Option<usize> {
        self.path.last().copied()
    }

    pub fn child(&self, index: usize) -> Option<Self> {
        let node = self.node.inputs().get(index)?.clone();
        let mut path = self.path.clone();
        path.push(index);
        Some(Position {
            root: self.root.clone(),
            path,
            node,
        })
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent_path) = self.path.split_last()?;
        Position::at(self.root.clone(), parent_path).ok()
    }

    /// All ancestors, nearest first.
    pub fn ancestors(&self) -> Vec<Self> {
        let mut ancestors = Vec::with_capacity(self.depth());
        let mut current = self.parent();
        while let Some(position) = current {
            current = position.parent();
            ancestors.push(position);
        }
        ancestors
    }

    /// Replaces the node at this position and returns the new root. Only the
    /// ancestors are rebuilt; everything else is shared with the old tree.
    pub fn replace(&self, subtree: Arc<N>) -> Result<Arc<N>> {
        rebuild(&self.root, &self.path, subtree)
    }
}

fn rebuild<N: PlanNode>(node: &Arc<N>, path: &[usize], subtree: Arc<N>) -> Result<Arc<N>> {
    match path.split_first() {
        None => Ok(subtree),
        Some((&index, rest)) => {
            let child = node.inputs().get(index).ok_or_else(|| {
                QueryError::internal(format!("{} has no input {}", node.name(), index))
            })?;
            let mut inputs = node.inputs().to_vec();
            inputs[index] = rebuild(child, rest, subtree)?;
            node.copy_with_inputs(inputs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::operators::LogicalNode;
    use crate::test_support::Fixture;

    fn create_tree(fixture: &Fixture) -> Arc<LogicalNode> {
        let scan = fixture.logical_scan(0, &[fixture.id(), fixture.name()]);
        let filter = LogicalNode::filter(scan, fixture.id_equals(1)).unwrap();
        let limit = LogicalNode::limit(filter, 10, 0).unwrap();
        LogicalNode::select(limit, vec![fixture.name()]).unwrap()
    }

    #[test]
    fn test_navigation() {
        let fixture = Fixture::new(1);
        let root = create_tree(&fixture);
        let scan = Position::at(root.clone(), &[0, 0, 0]).unwrap();
        assert_eq!(scan.node().name(), "EntityScan");
        assert_eq!(scan.depth(), 3);
        assert_eq!(scan.input_index(), Some(0));
        assert!(scan.child(0).is_none());

        let names: Vec<_> = scan.ancestors().iter().map(|p| p.node().name()).collect();
        assert_eq!(names, vec!["Filter", "Limit", "Select"]);
        assert!(scan.ancestors().last().unwrap().is_root());
        assert!(Position::at(root, &[1]).is_err());
    }

    #[test]
    fn test_replace_shares_untouched_nodes() {
        let fixture = Fixture::new(1);
        let root = create_tree(&fixture);
        let limit = Position::at(root.clone(), &[0]).unwrap();
        let filter = limit.node().inputs()[0].clone();
        let replacement = LogicalNode::limit(filter.clone(), 5, 0).unwrap();

        let rewritten = limit.replace(replacement).unwrap();
        assert_ne!(rewritten.digest(), root.digest());
        assert!(Arc::ptr_eq(&rewritten.inputs()[0].inputs()[0], &filter));
        assert_eq!(root.inputs()[0].traits().limit(), Some(10));
        assert_eq!(rewritten.inputs()[0].traits().limit(), Some(5));
    }
}
