/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::RewriteRule;
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::planner::operators::{PhysicalKind, PhysicalNode, PlanNode, Position};
use std::sync::Arc;

/// Merges a limit directly on top of a sort into a single limiting sort.
pub struct LimitingSortMergeRule;

impl LimitingSortMergeRule {
    fn sort_below_limit(node: &PhysicalNode) -> bool {
        match node.kind() {
            PhysicalKind::Limit { .. } => {
                let input = &node.inputs()[0];
                input.group_id() == node.group_id() && matches!(input.kind(), PhysicalKind::Sort { .. })
            }
            _ => false,
        }
    }
}

impl RewriteRule<PhysicalNode> for LimitingSortMergeRule {
    fn name(&self) -> &'static str {
        "LimitingSortMergeRule"
    }

    fn can_be_applied(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> bool {
        Self::sort_below_limit(position.node())
    }

    fn apply(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> Result<Option<Arc<PhysicalNode>>> {
        let node = position.node();
        let misapplied = QueryError::RuleMisapplied {
            rule: self.name(),
            node: node.name(),
        };
        let (limit, skip) = match node.kind() {
            PhysicalKind::Limit { limit, skip } => (*limit, *skip),
            _ => return Err(misapplied),
        };
        let sort = &node.inputs()[0];
        let order = match sort.kind() {
            PhysicalKind::Sort { order } => order.clone(),
            _ => return Err(misapplied),
        };
        let merged = PhysicalNode::limiting_sort(sort.inputs()[0].clone(), order, limit, skip)?;
        position.replace(merged).map(Some)
    }
}
