/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Rewrite rules and the exploration loop that applies them.
//!
//! A rule looks at a single [`Position`] and, if it applies, returns the root
//! of a new tree. Rules never mutate their input; the tree they were given
//! stays a valid candidate.

pub mod conjunction;
pub mod defer_fetch;
pub mod defer_function;
pub mod index;
pub mod limiting_sort;

pub use conjunction::{LeftConjunctionRewriteRule, RightConjunctionRewriteRule};
pub use defer_fetch::{DeferFetchOnFetchRewriteRule, DeferFetchOnScanRewriteRule};
pub use defer_function::DeferFunctionRewriteRule;
pub use index::{BooleanIndexScanRule, NearestNeighbourIndexScanRule};
pub use limiting_sort::LimitingSortMergeRule;

use super::operators::{LogicalNode, PhysicalNode, PlanNode, Position};
use crate::context::QueryContext;
use crate::error::Result;
use log::{debug, warn};
use rustc_hash::FxHashSet;
use shared::ColumnDescriptor;
use std::sync::Arc;

pub trait RewriteRule<N: PlanNode>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap check whether `apply` may produce something at this position.
    fn can_be_applied(&self, position: &Position<N>, ctx: &QueryContext) -> bool;

    /// Rewrites the tree at `position` and returns the new root, or `None` if
    /// the rewrite would not change anything.
    fn apply(&self, position: &Position<N>, ctx: &QueryContext) -> Result<Option<Arc<N>>>;
}

/// The rules used in one planning stage.
pub struct RuleGroup<N: PlanNode> {
    rules: Vec<Box<dyn RewriteRule<N>>>,
}

impl<N: PlanNode> RuleGroup<N> {
    pub fn new(rules: Vec<Box<dyn RewriteRule<N>>>) -> Self {
        RuleGroup { rules }
    }

    pub fn empty() -> Self {
        RuleGroup { rules: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RewriteRule<N>> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleGroup<LogicalNode> {
    pub fn logical_defaults() -> Self {
        RuleGroup::new(vec![
            Box::new(LeftConjunctionRewriteRule),
            Box::new(RightConjunctionRewriteRule),
        ])
    }
}

impl RuleGroup<PhysicalNode> {
    pub fn physical_defaults() -> Self {
        RuleGroup::new(vec![
            Box::new(BooleanIndexScanRule),
            Box::new(NearestNeighbourIndexScanRule),
            Box::new(DeferFetchOnScanRewriteRule),
            Box::new(DeferFetchOnFetchRewriteRule),
            Box::new(DeferFunctionRewriteRule),
            Box::new(LimitingSortMergeRule),
        ])
    }
}

/// Applies every rule at every position of the root's group, for the root
/// and each distinct tree derived from it. Returns all distinct trees that
/// pass `accept`, the input first.
///
/// Sub-trees of other groups are never visited. At most `budget` positions
/// are visited.
pub(crate) fn explore<N: PlanNode>(
    root: Arc<N>,
    rules: &RuleGroup<N>,
    ctx: &QueryContext,
    budget: usize,
    accept: &dyn Fn(&N) -> bool,
) -> Result<Vec<Arc<N>>> {
    let group_id = root.group_id();
    let mut seen = FxHashSet::default();
    let mut candidates = Vec::new();
    let mut stack = vec![Position::root(root.clone())];
    seen.insert(root.digest());
    if accept(&root) {
        candidates.push(root);
    }

    let mut visited = 0usize;
    while let Some(position) = stack.pop() {
        if visited >= budget {
            warn!(
                "exploration of group {} stopped after {} positions with {} candidate(s)",
                group_id,
                visited,
                candidates.len()
            );
            break;
        }
        visited += 1;

        for rule in rules.iter() {
            if !rule.can_be_applied(&position, ctx) {
                continue;
            }
            if let Some(tree) = rule.apply(&position, ctx)? {
                if seen.insert(tree.digest()) {
                    debug!("{} produced a new candidate for group {}", rule.name(), group_id);
                    if accept(&tree) {
                        candidates.push(tree.clone());
                    }
                    stack.push(Position::root(tree));
                }
            }
        }

        let node = position.node();
        for (index, input) in node.inputs().iter().enumerate() {
            if input.group_id() == group_id {
                if let Some(child) = position.child(index) {
                    stack.push(child);
                }
            }
        }
    }
    Ok(candidates)
}

/// Ancestors of a position that belong to the same group and are reached
/// through their first input, nearest first.
pub(crate) fn group_chain<N: PlanNode>(position: &Position<N>) -> Vec<Position<N>> {
    let group_id = position.node().group_id();
    let mut chain = Vec::new();
    let mut current = position.clone();
    while let Some(parent) = current.parent() {
        if parent.node().group_id() != group_id || current.input_index() != Some(0) {
            break;
        }
        current = parent.clone();
        chain.push(parent);
    }
    chain
}

/// Adds a projection if `node` does not produce `expected` in that order.
pub(crate) fn restore_layout(
    node: Arc<PhysicalNode>,
    expected: &[ColumnDescriptor],
) -> Result<Arc<PhysicalNode>> {
    if node.columns() == expected {
        Ok(node)
    } else {
        PhysicalNode::select(node, expected.to_vec())
    }
}

/// Rebuilds `ancestor` on top of a new first input.
pub(crate) fn replace_first_input<N: PlanNode>(ancestor: &N, input: Arc<N>) -> Result<Arc<N>> {
    let mut inputs = ancestor.inputs().to_vec();
    inputs[0] = input;
    ancestor.copy_with_inputs(inputs)
}
