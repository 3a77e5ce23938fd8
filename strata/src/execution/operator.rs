/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::binding::BindingContext;
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::planner::operators::{PhysicalKind, PhysicalNode, PlanNode};
use std::sync::Arc;

/// Executable form of a physical plan: every node paired with the bindings
/// it evaluates against. The partitions below a merge each get their own copy
/// of the bindings.
#[derive(Debug)]
pub struct Operator {
    pub(crate) node: Arc<PhysicalNode>,
    pub(crate) inputs: Vec<Operator>,
    pub(crate) bindings: BindingContext,
}

impl Operator {
    pub fn build(node: &Arc<PhysicalNode>, ctx: &QueryContext) -> Result<Self> {
        if !node.is_executable() {
            return Err(QueryError::NoPhysicalPlan {
                query_id: ctx.query_id().to_string(),
                digest: node.digest(),
            });
        }
        let inputs = match node.kind() {
            PhysicalKind::Merge => node
                .inputs()
                .iter()
                .map(|input| Operator::build(input, &ctx.split()))
                .collect::<Result<Vec<_>>>()?,
            _ => node
                .inputs()
                .iter()
                .map(|input| Operator::build(input, ctx))
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(Operator {
            node: node.clone(),
            inputs,
            bindings: ctx.bindings().clone(),
        })
    }

    pub fn node(&self) -> &Arc<PhysicalNode> {
        &self.node
    }

    pub fn inputs(&self) -> &[Operator] {
        &self.inputs
    }

    pub fn bindings(&self) -> &BindingContext {
        &self.bindings
    }

    /// Number of operators in this tree.
    pub fn size(&self) -> usize {
        1 + self.inputs.iter().map(Operator::size).sum::<usize>()
    }
}
