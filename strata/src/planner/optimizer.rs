/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::cache::PlanCache;
use super::cost::{Cost, CostPolicy};
use super::operators::{LogicalNode, PhysicalNode, PlanNode, Position};
use super::rules::{explore, RuleGroup};
use crate::config::PlannerConfig;
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::{Digest, GroupId};
use log::{debug, info};
use rustc_hash::{FxHashSet, FxHasher};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

/// Cost-based planner turning the logical plans of a [`QueryContext`] into
/// physical plans.
pub struct QueryPlanner {
    logical_rules: RuleGroup<LogicalNode>,
    physical_rules: RuleGroup<PhysicalNode>,
    cache: Arc<PlanCache>,
    exploration_budget: usize,
}

impl QueryPlanner {
    pub fn new(
        logical_rules: RuleGroup<LogicalNode>,
        physical_rules: RuleGroup<PhysicalNode>,
        cache: Arc<PlanCache>,
        config: &PlannerConfig,
    ) -> Self {
        QueryPlanner {
            logical_rules,
            physical_rules,
            cache,
            exploration_budget: config.exploration_budget,
        }
    }

    /// A planner with all built-in rules.
    pub fn with_default_rules(cache: Arc<PlanCache>, config: &PlannerConfig) -> Self {
        Self::new(
            RuleGroup::logical_defaults(),
            RuleGroup::physical_defaults(),
            cache,
            config,
        )
    }

    pub fn cache(&self) -> &Arc<PlanCache> {
        &self.cache
    }

    /// Plans every logical plan registered with `ctx` and stores the results
    /// in the context. With `bypass_cache` cached plans are ignored; with
    /// `cache` set the new plans are stored in the cache.
    pub fn plan(&self, ctx: &QueryContext, bypass_cache: bool, cache: bool) -> Result<()> {
        let start = Instant::now();
        let logical = ctx.logical()?;
        if logical.is_empty() {
            return Err(QueryError::invalid_query(format!(
                "query {} has no logical plan",
                ctx.query_id()
            )));
        }

        let mut physical = Vec::with_capacity(logical.len());
        for root in &logical {
            let key = cache_key(ctx, root.digest());
            if !bypass_cache {
                if let Some(plan) = self.cache.get(key) {
                    debug!("plan cache hit for {} in query {}", root, ctx.query_id());
                    physical.push(plan);
                    continue;
                }
            }
            let plan = self.plan_root(ctx, root)?;
            if cache {
                self.cache.set(key, plan.clone());
            }
            physical.push(plan);
        }

        let elapsed = start.elapsed();
        info!("planned query {} in {:?}", ctx.query_id(), elapsed);
        ctx.set_physical(physical, elapsed)
    }

    /// Implements every logical plan registered with `ctx` 1:1, without any
    /// rewriting.
    pub fn implement(&self, ctx: &QueryContext) -> Result<()> {
        let start = Instant::now();
        let logical = ctx.logical()?;
        let mut physical = Vec::with_capacity(logical.len());
        for root in &logical {
            let plan = root.implement()?;
            if !plan.is_executable() {
                return Err(QueryError::NoPhysicalPlan {
                    query_id: ctx.query_id().to_string(),
                    digest: root.digest(),
                });
            }
            physical.push(plan);
        }
        ctx.set_physical(physical, start.elapsed())
    }

    fn plan_root(&self, ctx: &QueryContext, root: &Arc<LogicalNode>) -> Result<Arc<PhysicalNode>> {
        let mut groups = BTreeMap::new();
        decompose(root, &mut groups)?;

        let mut winners = BTreeMap::new();
        for (group_id, subtree) in &groups {
            let winner = self.plan_group(ctx, *group_id, subtree)?;
            debug!(
                "group {} of query {}:\n{}",
                group_id,
                ctx.query_id(),
                winner.explain()
            );
            winners.insert(*group_id, winner);
        }
        compose(root.group_id(), &winners)
    }

    fn plan_group(
        &self,
        ctx: &QueryContext,
        group_id: GroupId,
        subtree: &Arc<LogicalNode>,
    ) -> Result<Arc<PhysicalNode>> {
        let logical = explore(
            subtree.clone(),
            &self.logical_rules,
            ctx,
            self.exploration_budget,
            &|_| true,
        )?;

        let mut seen = FxHashSet::default();
        let mut candidates = Vec::new();
        for tree in logical {
            let physical = explore(
                tree.implement()?,
                &self.physical_rules,
                ctx,
                self.exploration_budget,
                &|n: &PhysicalNode| n.is_executable_in_group(group_id),
            )?;
            for candidate in physical {
                if seen.insert(candidate.digest()) {
                    candidates.push(candidate);
                }
            }
        }
        debug!(
            "{} physical candidate(s) for group {} of query {}",
            candidates.len(),
            group_id,
            ctx.query_id()
        );

        select(&candidates, ctx.cost_policy()).ok_or_else(|| QueryError::NoPhysicalPlan {
            query_id: ctx.query_id().to_string(),
            digest: subtree.digest(),
        })
    }
}

/// Plans differ with the index hint and the cost policy, so both are part of
/// the key whenever they are set.
fn cache_key(ctx: &QueryContext, digest: Digest) -> Digest {
    let hints = ctx.hints();
    if hints.index().is_none() && hints.cost_policy().is_none() {
        return digest;
    }
    let mut hasher = FxHasher::default();
    digest.hash(&mut hasher);
    format!("{:?}", hints.index()).hash(&mut hasher);
    let policy = ctx.cost_policy();
    for weight in [
        policy.w_io,
        policy.w_cpu,
        policy.w_memory,
        policy.speedup_per_worker,
        policy.non_parallelisable_io,
    ] {
        weight.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// Splits a plan into the sub-trees of its groups.
fn decompose(root: &Arc<LogicalNode>, groups: &mut BTreeMap<GroupId, Arc<LogicalNode>>) -> Result<()> {
    let group_id = root.group_id();
    if groups.insert(group_id, root.clone()).is_some() {
        return Err(QueryError::invalid_query(format!(
            "group {} appears more than once in the plan",
            group_id
        )));
    }
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        for input in node.inputs() {
            if input.group_id() == group_id {
                stack.push(input.clone());
            } else {
                decompose(input, groups)?;
            }
        }
    }
    Ok(())
}

/// Replaces the sub-trees of other groups in the winner of `group_id` by
/// their own winners.
fn compose(group_id: GroupId, winners: &BTreeMap<GroupId, Arc<PhysicalNode>>) -> Result<Arc<PhysicalNode>> {
    let winner = winners
        .get(&group_id)
        .cloned()
        .ok_or(QueryError::UnknownGroup(group_id))?;
    let mut foreign = Vec::new();
    collect_foreign(&winner, group_id, &mut Vec::new(), &mut foreign);

    let mut result = winner;
    for path in foreign {
        let position = Position::at(result.clone(), &path)?;
        let composed = compose(position.node().group_id(), winners)?;
        result = position.replace(composed)?;
    }
    Ok(result)
}

fn collect_foreign(
    node: &Arc<PhysicalNode>,
    group_id: GroupId,
    path: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    for (index, input) in node.inputs().iter().enumerate() {
        path.push(index);
        if input.group_id() == group_id {
            collect_foreign(input, group_id, path, out);
        } else {
            out.push(path.clone());
        }
        path.pop();
    }
}

/// The candidate with the lowest score after normalising all costs by the
/// per-component maximum. Ties go to the earlier candidate.
fn select(candidates: &[Arc<PhysicalNode>], policy: &CostPolicy) -> Option<Arc<PhysicalNode>> {
    let costs: Vec<Cost> = candidates.iter().map(|c| c.total_cost()).collect();
    let max = Cost::max_of(costs.iter());
    let (winner, score) = candidates
        .iter()
        .zip(costs.iter())
        .map(|(candidate, cost)| (candidate, policy.to_score(&cost.normalize(&max))))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))?;
    debug!("selected {} with score {:.4}", winner, score);
    Some(winner.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::IndexType;
    use crate::config::PlannerConfig;
    use crate::test_support::Fixture;

    fn create_planner() -> QueryPlanner {
        QueryPlanner::with_default_rules(Arc::new(PlanCache::new(10)), &PlannerConfig::default())
    }

    #[test]
    fn test_plan_uses_index() {
        let fixture = Fixture::new(1000);
        fixture.entity.create_index("id_btree", &fixture.id(), IndexType::BTree).unwrap();
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.logical_scan(0, &[fixture.id(), fixture.name()]);
        let filter = LogicalNode::filter(scan, fixture.id_equals(5)).unwrap();
        ctx.register(LogicalNode::select(filter, vec![fixture.name()]).unwrap()).unwrap();

        create_planner().plan(&ctx, false, true).unwrap();
        let plan = ctx.physical().unwrap().remove(0);
        assert!(plan.any(&|n: &PhysicalNode| n.name() == "IndexScan"));
        assert_eq!(plan.columns(), &[fixture.name()]);
    }

    #[test]
    fn test_conjunction_is_split_for_index() {
        let fixture = Fixture::new(1000);
        fixture.entity.create_index("id_hash", &fixture.id(), IndexType::Hash).unwrap();
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.logical_scan(0, &[fixture.id(), fixture.name()]);
        let predicate = fixture.id_equals(5).and(fixture.id_equals(5).negate());
        ctx.register(LogicalNode::filter(scan, predicate).unwrap()).unwrap();

        create_planner().plan(&ctx, false, false).unwrap();
        let plan = ctx.physical().unwrap().remove(0);
        assert!(plan.any(&|n: &PhysicalNode| n.name() == "IndexScan"));
    }

    #[test]
    fn test_decompose_and_compose_groups() {
        let fixture = Fixture::new(100);
        let ctx = fixture.context(1, vec![]);
        let left = fixture.logical_scan(0, &[fixture.id(), fixture.name()]);
        let right = LogicalNode::entity_scan(1, fixture.other_entity(), vec![fixture.other_id()]).unwrap();
        let root = LogicalNode::filter_on_subselect(left, right, fixture.id_in_subquery(1)).unwrap();
        let root = LogicalNode::limit(root, 10, 0).unwrap();

        let mut groups = BTreeMap::new();
        decompose(&root, &mut groups).unwrap();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![0, 1]);

        ctx.register(root.clone()).unwrap();
        create_planner().plan(&ctx, false, false).unwrap();
        let plan = ctx.physical().unwrap().remove(0);
        assert!(plan.any(&|n: &PhysicalNode| n.group_id() == 1));
        assert_eq!(plan.columns(), root.columns());
        assert!(plan.is_executable());
    }

    #[test]
    fn test_no_executable_plan() {
        let fixture = Fixture::new(100);
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.logical_scan(0, &[fixture.name()]);
        ctx.register(LogicalNode::filter(scan, fixture.name_matches("name")).unwrap()).unwrap();
        let error = create_planner().plan(&ctx, false, true).unwrap_err();
        assert!(matches!(error, QueryError::NoPhysicalPlan { .. }));
        assert!(ctx.physical().is_err());
    }

    #[test]
    fn test_fulltext_index_makes_match_executable() {
        let fixture = Fixture::new(100);
        fixture.entity.create_index("name_fts", &fixture.name(), IndexType::Fulltext).unwrap();
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.logical_scan(0, &[fixture.name()]);
        ctx.register(LogicalNode::filter(scan, fixture.name_matches("name")).unwrap()).unwrap();
        create_planner().plan(&ctx, false, true).unwrap();
        let plan = ctx.physical().unwrap().remove(0);
        assert_eq!(plan.to_string(), "IndexScan[0]");
    }

    #[test]
    fn test_cache_key_depends_on_index_hint() {
        let fixture = Fixture::new(10);
        let plain = fixture.context(1, vec![]);
        let hinted = fixture.context(1, vec![crate::QueryHint::Index(crate::IndexHint::None)]);
        assert_eq!(cache_key(&plain, 42), 42);
        assert_ne!(cache_key(&hinted, 42), 42);
    }
}
