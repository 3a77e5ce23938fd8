/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Splits a conjunctive filter into two nested filters. The two rules differ
//! only in which operand ends up closer to the source.

use super::RewriteRule;
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::planner::operators::{LogicalKind, LogicalNode, PlanNode, Position};
use crate::predicate::BooleanPredicate;
use std::sync::Arc;

fn conjunction(node: &LogicalNode) -> Option<(&BooleanPredicate, &BooleanPredicate)> {
    match node.kind() {
        LogicalKind::Filter {
            predicate: BooleanPredicate::And(p1, p2),
        } => Some((p1, p2)),
        _ => None,
    }
}

fn split(
    rule: &'static str,
    position: &Position<LogicalNode>,
    inner_first: bool,
) -> Result<Option<Arc<LogicalNode>>> {
    let node = position.node();
    let (p1, p2) = conjunction(node).ok_or(QueryError::RuleMisapplied {
        rule,
        node: node.name(),
    })?;
    let (inner, outer) = if inner_first { (p1, p2) } else { (p2, p1) };
    let input = node.inputs()[0].clone();
    let filter = LogicalNode::filter(input, inner.clone())?;
    let filter = LogicalNode::filter(filter, outer.clone())?;
    position.replace(filter).map(Some)
}

/// `Filter(p1 AND p2)` becomes `Filter(p2)` over `Filter(p1)`.
pub struct LeftConjunctionRewriteRule;

impl RewriteRule<LogicalNode> for LeftConjunctionRewriteRule {
    fn name(&self) -> &'static str {
        "LeftConjunctionRewriteRule"
    }

    fn can_be_applied(&self, position: &Position<LogicalNode>, _ctx: &QueryContext) -> bool {
        conjunction(position.node()).is_some()
    }

    fn apply(&self, position: &Position<LogicalNode>, _ctx: &QueryContext) -> Result<Option<Arc<LogicalNode>>> {
        split(self.name(), position, true)
    }
}

/// `Filter(p1 AND p2)` becomes `Filter(p1)` over `Filter(p2)`.
pub struct RightConjunctionRewriteRule;

impl RewriteRule<LogicalNode> for RightConjunctionRewriteRule {
    fn name(&self) -> &'static str {
        "RightConjunctionRewriteRule"
    }

    fn can_be_applied(&self, position: &Position<LogicalNode>, _ctx: &QueryContext) -> bool {
        conjunction(position.node()).is_some()
    }

    fn apply(&self, position: &Position<LogicalNode>, _ctx: &QueryContext) -> Result<Option<Arc<LogicalNode>>> {
        split(self.name(), position, false)
    }
}
