/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Moves the reading of columns up the tree, to just below the first node
//! that needs them. Columns no node needs are not read at all.

use super::{group_chain, replace_first_input, restore_layout, RewriteRule};
use crate::catalogue::Entity;
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::planner::operators::{PhysicalKind, PhysicalNode, PlanNode, Position};
use shared::ColumnDescriptor;
use std::sync::Arc;

/// Where a column read by the source ends up.
enum Placement {
    /// Just below the ancestor with this index in the chain.
    Before(usize),
    /// On top of the chain.
    Top,
    /// Nowhere; the column is projected away without being used.
    Dropped,
}

fn placement(chain: &[Position<PhysicalNode>], column: &ColumnDescriptor) -> Placement {
    for (j, ancestor) in chain.iter().enumerate() {
        let node = ancestor.node();
        if node.requires().contains(column) {
            return Placement::Before(j);
        }
        if !node.columns().contains(column) {
            return Placement::Dropped;
        }
    }
    Placement::Top
}

/// Rewrites the chain above `position`, whose source reads `fetch` from
/// `entity`. `source` rebuilds the source with the columns that stay there.
fn defer(
    position: &Position<PhysicalNode>,
    entity: &Arc<dyn Entity>,
    fetch: &[ColumnDescriptor],
    source: impl FnOnce(Vec<ColumnDescriptor>) -> Result<Arc<PhysicalNode>>,
) -> Result<Option<Arc<PhysicalNode>>> {
    let chain = group_chain(position);
    let top = match chain.last() {
        Some(top) => top,
        None => return Ok(None),
    };

    let mut before: Vec<Vec<ColumnDescriptor>> = vec![Vec::new(); chain.len()];
    let mut on_top = Vec::new();
    for column in fetch {
        match placement(&chain, column) {
            Placement::Before(j) => before[j].push(column.clone()),
            Placement::Top => on_top.push(column.clone()),
            Placement::Dropped => {}
        }
    }
    if before[0].len() == fetch.len() {
        return Ok(None);
    }

    let mut current = source(std::mem::take(&mut before[0]))?;
    for (j, ancestor) in chain.iter().enumerate() {
        let deferred = std::mem::take(&mut before[j]);
        if !deferred.is_empty() {
            current = PhysicalNode::fetch(current, entity.clone(), deferred)?;
        }
        current = replace_first_input(ancestor.node().as_ref(), current)?;
    }
    if !on_top.is_empty() {
        current = PhysicalNode::fetch(current, entity.clone(), on_top)?;
    }
    let current = restore_layout(current, top.node().columns())?;
    top.replace(current).map(Some)
}

/// Defers the columns read by a full entity scan.
pub struct DeferFetchOnScanRewriteRule;

impl RewriteRule<PhysicalNode> for DeferFetchOnScanRewriteRule {
    fn name(&self) -> &'static str {
        "DeferFetchOnScanRewriteRule"
    }

    fn can_be_applied(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> bool {
        matches!(position.node().kind(), PhysicalKind::EntityScan { fetch, .. } if !fetch.is_empty())
            && position
                .parent()
                .is_some_and(|p| p.node().group_id() == position.node().group_id())
    }

    fn apply(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> Result<Option<Arc<PhysicalNode>>> {
        let node = position.node();
        match node.kind() {
            PhysicalKind::EntityScan {
                entity,
                fetch,
                partition,
            } => defer(position, entity, fetch, |kept| {
                PhysicalNode::new(
                    node.group_id(),
                    PhysicalKind::EntityScan {
                        entity: entity.clone(),
                        fetch: kept,
                        partition: *partition,
                    },
                    vec![],
                )
            }),
            _ => Err(QueryError::RuleMisapplied {
                rule: self.name(),
                node: node.name(),
            }),
        }
    }
}

/// Defers the columns read by a fetch, removing it if nothing stays.
pub struct DeferFetchOnFetchRewriteRule;

impl RewriteRule<PhysicalNode> for DeferFetchOnFetchRewriteRule {
    fn name(&self) -> &'static str {
        "DeferFetchOnFetchRewriteRule"
    }

    fn can_be_applied(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> bool {
        matches!(position.node().kind(), PhysicalKind::Fetch { .. })
            && position
                .parent()
                .is_some_and(|p| p.node().group_id() == position.node().group_id())
    }

    fn apply(&self, position: &Position<PhysicalNode>, _ctx: &QueryContext) -> Result<Option<Arc<PhysicalNode>>> {
        let node = position.node();
        match node.kind() {
            PhysicalKind::Fetch { entity, fetch } => defer(position, entity, fetch, |kept| {
                let input = node.inputs()[0].clone();
                if kept.is_empty() {
                    Ok(input)
                } else {
                    PhysicalNode::fetch(input, entity.clone(), kept)
                }
            }),
            _ => Err(QueryError::RuleMisapplied {
                rule: self.name(),
                node: node.name(),
            }),
        }
    }
}
