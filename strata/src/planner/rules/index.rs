/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{restore_layout, RewriteRule};
use crate::catalogue::{Entity, Index};
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::hints::IndexHint;
use crate::planner::operators::{PhysicalKind, PhysicalNode, PlanNode, Position};
use crate::predicate::{BooleanPredicate, ProximityPredicate};
use log::debug;
use shared::{ColumnDescriptor, SortOrder};
use std::sync::Arc;

/// Replaces a filter directly on top of a full entity scan by a scan of the
/// cheapest index that can evaluate the predicate. Columns the index does
/// not produce are fetched afterwards.
pub struct BooleanIndexScanRule;

impl BooleanIndexScanRule {
    fn matches(node: &PhysicalNode) -> Option<(&BooleanPredicate, &Arc<dyn Entity>, &[ColumnDescriptor])> {
        let predicate = match node.kind() {
            PhysicalKind::Filter { predicate } => predicate,
            _ => return None,
        };
        let input = &node.inputs()[0];
        if input.group_id() != node.group_id() {
            return None;
        }
        match input.kind() {
            PhysicalKind::EntityScan {
                entity,
                fetch,
                partition,
            } if !partition.is_partitioned() => Some((predicate, entity, fetch.as_slice())),
            _ => None,
        }
    }
}

impl RewriteRule<PhysicalNode> for BooleanIndexScanRule {
    fn name(&self) -> &'static str {
        "BooleanIndexScanRule"
    }

    fn can_be_applied(&self, position: &Position<PhysicalNode>, ctx: &QueryContext) -> bool {
        ctx.hints().index() != Some(&IndexHint::None) && Self::matches(position.node()).is_some()
    }

    fn apply(&self, position: &Position<PhysicalNode>, ctx: &QueryContext) -> Result<Option<Arc<PhysicalNode>>> {
        let node = position.node();
        let (predicate, entity, fetch) = Self::matches(node).ok_or(QueryError::RuleMisapplied {
            rule: self.name(),
            node: node.name(),
        })?;

        let policy = ctx.cost_policy();
        let hints = ctx.hints();
        let index = entity
            .indexes()
            .into_iter()
            .filter(|i| !i.is_dirty() && hints.allows(i.as_ref()) && i.can_process(predicate))
            .map(|i| {
                let score = policy.to_score(&i.cost(predicate));
                (i, score)
            })
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i);
        let index: Arc<dyn Index> = match index {
            Some(index) => index,
            None => return Ok(None),
        };
        debug!("{} selected index {} for {}", self.name(), index.name(), predicate);

        let (produced, missing): (Vec<ColumnDescriptor>, Vec<ColumnDescriptor>) =
            fetch.iter().cloned().partition(|c| index.produces().contains(c));
        let mut replacement = PhysicalNode::index_scan(node.group_id(), index, predicate.clone(), produced)?;
        if !missing.is_empty() {
            replacement = PhysicalNode::fetch(replacement, entity.clone(), missing)?;
        }
        let replacement = restore_layout(replacement, node.columns())?;
        position.replace(replacement).map(Some)
    }
}

/// Replaces a distance function over a full entity scan by a scan of a
/// vector index, if the distance is sorted on and then limited. The sort and
/// limit stay above the index scan.
pub struct NearestNeighbourIndexScanRule;

impl NearestNeighbourIndexScanRule {
    /// First sort column and the number of tuples the limit keeps, taken
    /// from a `LimitingSort` or a `Sort` under a `Limit`.
    fn ranking(position: &Position<PhysicalNode>) -> Option<(ColumnDescriptor, SortOrder, i64)> {
        let group_id = position.node().group_id();
        let parent = position.parent().filter(|p| p.node().group_id() == group_id)?;
        match parent.node().kind() {
            PhysicalKind::LimitingSort { order, limit, skip } => {
                let (column, direction) = order.first()?.clone();
                Some((column, direction, limit.saturating_add(*skip)))
            }
            PhysicalKind::Sort { order } => {
                let grandparent = parent.parent().filter(|p| p.node().group_id() == group_id)?;
                match grandparent.node().kind() {
                    PhysicalKind::Limit { limit, skip } => {
                        let (column, direction) = order.first()?.clone();
                        Some((column, direction, limit.saturating_add(*skip)))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn matches(
        position: &Position<PhysicalNode>,
    ) -> Option<(ProximityPredicate, &Arc<dyn Entity>, &[ColumnDescriptor])> {
        let node = position.node();
        let call = match node.kind() {
            PhysicalKind::Function { call } => call,
            _ => return None,
        };
        let input = &node.inputs()[0];
        if input.group_id() != node.group_id() {
            return None;
        }
        let (entity, fetch) = match input.kind() {
            PhysicalKind::EntityScan {
                entity,
                fetch,
                partition,
            } if !partition.is_partitioned() => (entity, fetch.as_slice()),
            _ => return None,
        };
        let (column, order, k) = Self::ranking(position)?;
        if column != call.out {
            return None;
        }
        let predicate = ProximityPredicate::new(call.clone(), k, order)?;
        Some((predicate, entity, fetch))
    }
}

impl RewriteRule<PhysicalNode> for NearestNeighbourIndexScanRule {
    fn name(&self) -> &'static str {
        "NearestNeighbourIndexScanRule"
    }

    fn can_be_applied(&self, position: &Position<PhysicalNode>, ctx: &QueryContext) -> bool {
        ctx.hints().index() != Some(&IndexHint::None)
            && matches!(position.node().kind(), PhysicalKind::Function { .. })
            && Self::matches(position).is_some()
    }

    fn apply(&self, position: &Position<PhysicalNode>, ctx: &QueryContext) -> Result<Option<Arc<PhysicalNode>>> {
        let node = position.node();
        let (predicate, entity, fetch) = Self::matches(position).ok_or(QueryError::RuleMisapplied {
            rule: self.name(),
            node: node.name(),
        })?;

        let policy = ctx.cost_policy();
        let hints = ctx.hints();
        let index = entity
            .indexes()
            .into_iter()
            .filter(|i| !i.is_dirty() && hints.allows(i.as_ref()) && i.can_process_nearest(&predicate))
            .map(|i| {
                let score = policy.to_score(&i.nearest_cost(&predicate));
                (i, score)
            })
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i);
        let index: Arc<dyn Index> = match index {
            Some(index) => index,
            None => return Ok(None),
        };
        debug!("{} selected index {} for {}", self.name(), index.name(), predicate);

        let available = index.nearest_columns(&predicate);
        let produced: Vec<ColumnDescriptor> = available
            .iter()
            .filter(|c| *c == predicate.distance() || fetch.contains(c))
            .cloned()
            .collect();
        let missing: Vec<ColumnDescriptor> = fetch.iter().filter(|c| !available.contains(c)).cloned().collect();
        let mut replacement = PhysicalNode::nearest_neighbour_scan(node.group_id(), index, predicate, produced)?;
        if !missing.is_empty() {
            replacement = PhysicalNode::fetch(replacement, entity.clone(), missing)?;
        }
        let replacement = restore_layout(replacement, node.columns())?;
        position.replace(replacement).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::IndexType;
    use crate::hints::QueryHint;
    use crate::test_support::Fixture;

    fn create_filter(fixture: &Fixture, columns: &[ColumnDescriptor]) -> Arc<PhysicalNode> {
        let scan = fixture.physical_scan(0, columns);
        let filter = PhysicalNode::filter(scan, fixture.id_equals(7)).unwrap();
        PhysicalNode::limit(filter, 10, 0).unwrap()
    }

    #[test]
    fn test_index_replaces_filter_and_scan() {
        let fixture = Fixture::new(1000);
        fixture.entity.create_index("id_btree", &fixture.id(), IndexType::BTree).unwrap();
        let ctx = fixture.context(1, vec![]);
        let root = create_filter(&fixture, &[fixture.id(), fixture.name()]);
        let position = Position::root(root.clone()).child(0).unwrap();

        assert!(BooleanIndexScanRule.can_be_applied(&position, &ctx));
        let rewritten = BooleanIndexScanRule.apply(&position, &ctx).unwrap().unwrap();
        assert_eq!(rewritten.to_string(), "Limit[0](Fetch[0](IndexScan[0]))");
        assert_eq!(rewritten.columns(), root.columns());
        assert!(rewritten.total_cost().io < root.total_cost().io);
    }

    #[test]
    fn test_layout_is_restored() {
        let fixture = Fixture::new(100);
        fixture.entity.create_index("id_hash", &fixture.id(), IndexType::Hash).unwrap();
        let ctx = fixture.context(1, vec![]);
        let root = create_filter(&fixture, &[fixture.name(), fixture.id()]);
        let position = Position::root(root.clone()).child(0).unwrap();
        let rewritten = BooleanIndexScanRule.apply(&position, &ctx).unwrap().unwrap();
        assert_eq!(rewritten.to_string(), "Limit[0](Select[0](Fetch[0](IndexScan[0])))");
        assert_eq!(rewritten.columns(), &[fixture.name(), fixture.id()]);
    }

    #[test]
    fn test_cheapest_index_wins() {
        let fixture = Fixture::new(1000);
        fixture.entity.create_index("id_btree", &fixture.id(), IndexType::BTree).unwrap();
        fixture.entity.create_index("id_hash", &fixture.id(), IndexType::Hash).unwrap();
        let ctx = fixture.context(1, vec![]);
        let position = Position::root(create_filter(&fixture, &[fixture.id()])).child(0).unwrap();
        let rewritten = BooleanIndexScanRule.apply(&position, &ctx).unwrap().unwrap();
        match rewritten.inputs()[0].kind() {
            PhysicalKind::IndexScan { index, .. } => assert_eq!(index.name(), "id_hash"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hints_and_dirty_indexes() {
        let fixture = Fixture::new(100);
        let index = fixture.entity.create_index("id_btree", &fixture.id(), IndexType::BTree).unwrap();
        let root = create_filter(&fixture, &[fixture.id()]);
        let position = Position::root(root).child(0).unwrap();

        let no_index = fixture.context(1, vec![QueryHint::Index(IndexHint::None)]);
        assert!(!BooleanIndexScanRule.can_be_applied(&position, &no_index));

        let other_name = fixture.context(1, vec![QueryHint::Index(IndexHint::Name("other".into()))]);
        assert!(BooleanIndexScanRule.apply(&position, &other_name).unwrap().is_none());

        index.set_dirty(true);
        let ctx = fixture.context(1, vec![]);
        assert!(BooleanIndexScanRule.apply(&position, &ctx).unwrap().is_none());
    }

    #[test]
    fn test_inexact_index_needs_hint() {
        let fixture = Fixture::new(100);
        fixture
            .entity
            .create_index_with("id_approx", &fixture.id(), IndexType::BTree, false)
            .unwrap();
        let position = Position::root(create_filter(&fixture, &[fixture.id()])).child(0).unwrap();
        let ctx = fixture.context(1, vec![]);
        assert!(BooleanIndexScanRule.apply(&position, &ctx).unwrap().is_none());
        let inexact = fixture.context(1, vec![QueryHint::Index(IndexHint::Inexact)]);
        assert!(BooleanIndexScanRule.apply(&position, &inexact).unwrap().is_some());
    }

    fn create_knn(fixture: &Fixture, columns: &[ColumnDescriptor], limit: i64, skip: i64) -> Arc<PhysicalNode> {
        let scan = fixture.physical_scan(0, columns);
        let function = PhysicalNode::function(scan, fixture.distance()).unwrap();
        let sort = PhysicalNode::sort(function, vec![(fixture.distance_column(), SortOrder::Ascending)]).unwrap();
        PhysicalNode::limit(sort, limit, skip).unwrap()
    }

    fn nearest_predicate(node: &PhysicalNode) -> Option<ProximityPredicate> {
        match node.kind() {
            PhysicalKind::NearestNeighbourScan { predicate, .. } => Some(predicate.clone()),
            _ => node.inputs().iter().find_map(|i| nearest_predicate(i)),
        }
    }

    #[test]
    fn test_vector_index_replaces_distance_over_scan() {
        let fixture = Fixture::new(1000);
        fixture.entity.create_index("feature_vector", &fixture.feature(), IndexType::Vector).unwrap();
        let ctx = fixture.context(1, vec![]);
        let root = create_knn(&fixture, &[fixture.id(), fixture.feature()], 10, 2);
        let position = Position::at(root.clone(), &[0, 0]).unwrap();

        assert!(NearestNeighbourIndexScanRule.can_be_applied(&position, &ctx));
        let rewritten = NearestNeighbourIndexScanRule.apply(&position, &ctx).unwrap().unwrap();
        assert_eq!(
            rewritten.to_string(),
            "Limit[0](Sort[0](Select[0](Fetch[0](NearestNeighbourScan[0]))))"
        );
        assert_eq!(rewritten.columns(), root.columns());
        let predicate = nearest_predicate(&rewritten).unwrap();
        assert_eq!((predicate.k, predicate.order), (12, SortOrder::Ascending));
        assert_eq!(predicate.column, fixture.feature());
        assert!(rewritten.total_cost().io < root.total_cost().io);
    }

    #[test]
    fn test_limiting_sort_selects_farthest_neighbours() {
        let fixture = Fixture::new(100);
        fixture.entity.create_index("feature_vector", &fixture.feature(), IndexType::Vector).unwrap();
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.physical_scan(0, &[fixture.feature()]);
        let function = PhysicalNode::function(scan, fixture.distance()).unwrap();
        let order = vec![(fixture.distance_column(), SortOrder::Descending)];
        let root = PhysicalNode::limiting_sort(function, order, 3, 0).unwrap();

        let position = Position::root(root.clone()).child(0).unwrap();
        let rewritten = NearestNeighbourIndexScanRule.apply(&position, &ctx).unwrap().unwrap();
        assert_eq!(rewritten.to_string(), "LimitingSort[0](Select[0](NearestNeighbourScan[0]))");
        assert_eq!(rewritten.columns(), root.columns());
        let predicate = nearest_predicate(&rewritten).unwrap();
        assert_eq!((predicate.k, predicate.order), (3, SortOrder::Descending));
    }

    #[test]
    fn test_nearest_neighbours_need_limit_sort_and_index() {
        let fixture = Fixture::new(100);
        let ctx = fixture.context(1, vec![]);
        let root = create_knn(&fixture, &[fixture.feature()], 5, 0);
        let position = Position::at(root.clone(), &[0, 0]).unwrap();
        assert!(NearestNeighbourIndexScanRule.can_be_applied(&position, &ctx));
        assert!(NearestNeighbourIndexScanRule.apply(&position, &ctx).unwrap().is_none());

        fixture.entity.create_index("feature_vector", &fixture.feature(), IndexType::Vector).unwrap();
        let no_index = fixture.context(1, vec![QueryHint::Index(IndexHint::None)]);
        assert!(!NearestNeighbourIndexScanRule.can_be_applied(&position, &no_index));

        let scan = fixture.physical_scan(0, &[fixture.id(), fixture.feature()]);
        let function = PhysicalNode::function(scan, fixture.distance()).unwrap();
        let unlimited = PhysicalNode::sort(function.clone(), vec![(fixture.distance_column(), SortOrder::Ascending)]).unwrap();
        let position = Position::root(unlimited).child(0).unwrap();
        assert!(!NearestNeighbourIndexScanRule.can_be_applied(&position, &ctx));

        let by_id = PhysicalNode::sort(function, vec![(fixture.id(), SortOrder::Ascending)]).unwrap();
        let root = PhysicalNode::limit(by_id, 5, 0).unwrap();
        let position = Position::at(root, &[0, 0]).unwrap();
        assert!(!NearestNeighbourIndexScanRule.can_be_applied(&position, &ctx));
    }
}
