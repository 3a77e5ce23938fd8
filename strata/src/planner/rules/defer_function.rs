/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{group_chain, replace_first_input, restore_layout, RewriteRule};
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::function::FunctionCall;
use crate::planner::operators::{PhysicalKind, PhysicalNode, PlanNode, Position};
use std::sync::Arc;

/// Moves a function call up to just below the first node that reads its
/// result, so that it is evaluated for as few tuples as possible. A call
/// whose result is never read is removed.
pub struct DeferFunctionRewriteRule;

impl DeferFunctionRewriteRule {
    fn call(node: &PhysicalNode) -> Option<&FunctionCall> {
        match node.kind() {
            PhysicalKind::Function { call } => Some(call),
            _ => None,
        }
    }
}

impl RewriteRule<PhysicalNode> for DeferFunctionRewriteRule {
    fn name(&self) -> &'static str {
        "DeferFunctionRewriteRule"
    }

    fn can_be_applied(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> bool {
        Self::call(position.node()).is_some()
            && position
                .parent()
                .is_some_and(|p| p.node().group_id() == position.node().group_id())
    }

    fn apply(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> Result<Option<Arc<PhysicalNode>>> {
        let node = position.node();
        let call = Self::call(node).ok_or(QueryError::RuleMisapplied {
            rule: self.name(),
            node: node.name(),
        })?;
        let chain = group_chain(position);
        let top = match chain.last() {
            Some(top) => top,
            None => return Ok(None),
        };

        // Index of the first consumer of the result, chain.len() if the
        // result leaves the chain, None if it is projected away unused.
        let mut target = Some(chain.len());
        for (j, ancestor) in chain.iter().enumerate() {
            if ancestor.node().requires().contains(&call.out) {
                target = Some(j);
                break;
            }
            if !ancestor.node().columns().contains(&call.out) {
                target = None;
                break;
            }
        }
        if target == Some(0) {
            return Ok(None);
        }

        let arguments = call.columns();
        let place = |input: Arc<PhysicalNode>| -> Result<Option<Arc<PhysicalNode>>> {
            if arguments.iter().all(|c| input.columns().contains(c)) {
                PhysicalNode::function(input, call.clone()).map(Some)
            } else {
                Ok(None)
            }
        };

        let mut current = node.inputs()[0].clone();
        for (j, ancestor) in chain.iter().enumerate() {
            if target == Some(j) {
                current = match place(current)? {
                    Some(function) => function,
                    None => return Ok(None),
                };
            }
            current = replace_first_input(ancestor.node().as_ref(), current)?;
        }
        if target == Some(chain.len()) {
            current = match place(current)? {
                Some(function) => function,
                None => return Ok(None),
            };
        }
        let current = restore_layout(current, top.node().columns())?;
        top.replace(current).map(Some)
    }
}
