/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Per-query state shared by planning and execution.

use crate::binding::BindingContext;
use crate::catalogue::{Catalogue, Transaction};
use crate::error::{QueryError, Result};
use crate::execution::operator::Operator;
use crate::execution::{ExecutionEngine, ResultStream};
use crate::hints::{QueryHint, QueryHints};
use crate::planner::cost::CostPolicy;
use crate::planner::operators::{LogicalNode, PhysicalNode, PlanNode};
use crate::planner::QueryPlanner;
use crate::GroupId;
use log::debug;
use shared::{ColumnDescriptor, SortOrder};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Default)]
struct Plans {
    logical: Vec<Arc<LogicalNode>>,
    physical: Vec<Arc<PhysicalNode>>,
    planning_duration: Duration,
}

struct ContextState {
    query_id: String,
    catalogue: Arc<dyn Catalogue>,
    txn: Arc<dyn Transaction>,
    hints: QueryHints,
    cost_policy: CostPolicy,
    plans: RwLock<Plans>,
    next_group_id: AtomicI64,
    closed: AtomicBool,
}

/// State of a single query: its plans, hints and literal bindings.
///
/// Everything but the bindings is shared with the contexts created by
/// [`QueryContext::split`]; each of those owns a copy of the bindings so that
/// partitions can bind values independently.
pub struct QueryContext {
    state: Arc<ContextState>,
    bindings: BindingContext,
}

impl QueryContext {
    pub fn new(
        query_id: impl Into<String>,
        catalogue: Arc<dyn Catalogue>,
        txn: Arc<dyn Transaction>,
        hints: Vec<QueryHint>,
    ) -> Self {
        let hints = QueryHints::new(hints);
        let cost_policy = hints
            .cost_policy()
            .cloned()
            .unwrap_or_else(|| catalogue.default_cost_policy());
        QueryContext {
            state: Arc::new(ContextState {
                query_id: query_id.into(),
                catalogue,
                txn,
                hints,
                cost_policy,
                plans: RwLock::new(Plans::default()),
                next_group_id: AtomicI64::new(0),
                closed: AtomicBool::new(false),
            }),
            bindings: BindingContext::new(),
        }
    }

    pub fn query_id(&self) -> &str {
        &self.state.query_id
    }

    pub fn catalogue(&self) -> &Arc<dyn Catalogue> {
        &self.state.catalogue
    }

    pub fn txn(&self) -> &Arc<dyn Transaction> {
        &self.state.txn
    }

    pub fn hints(&self) -> &QueryHints {
        &self.state.hints
    }

    /// The cost policy from the hints, or the catalogue's default.
    pub fn cost_policy(&self) -> &CostPolicy {
        &self.state.cost_policy
    }

    pub fn bindings(&self) -> &BindingContext {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut BindingContext {
        &mut self.bindings
    }

    /// Allocates a group id that is not used by any registered plan.
    pub fn next_group_id(&self) -> GroupId {
        self.state.next_group_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(QueryError::ContextClosed {
                query_id: self.state.query_id.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn read_plans(&self) -> Result<std::sync::RwLockReadGuard<'_, Plans>> {
        self.check_open()?;
        Ok(self.state.plans.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write_plans(&self) -> Result<std::sync::RwLockWriteGuard<'_, Plans>> {
        self.check_open()?;
        Ok(self.state.plans.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Registers a logical plan, replacing a plan with the same group id.
    /// Physical plans of this context are discarded.
    pub fn register(&self, plan: Arc<LogicalNode>) -> Result<()> {
        let mut highest = plan.group_id();
        let mut stack = vec![plan.clone()];
        while let Some(node) = stack.pop() {
            highest = highest.max(node.group_id());
            stack.extend(node.inputs().iter().cloned());
        }
        self.state.next_group_id.fetch_max(highest + 1, Ordering::SeqCst);

        let mut plans = self.write_plans()?;
        match plans.logical.iter().position(|p| p.group_id() == plan.group_id()) {
            Some(index) => plans.logical[index] = plan,
            None => plans.logical.push(plan),
        }
        plans.physical.clear();
        Ok(())
    }

    pub fn logical(&self) -> Result<Vec<Arc<LogicalNode>>> {
        Ok(self.read_plans()?.logical.clone())
    }

    /// The physical plans, one per logical plan. Fails if the query has not
    /// been planned since the last registration.
    pub fn physical(&self) -> Result<Vec<Arc<PhysicalNode>>> {
        let plans = self.read_plans()?;
        if plans.physical.is_empty() {
            return Err(QueryError::invalid_query(format!(
                "query {} has not been planned",
                self.state.query_id
            )));
        }
        Ok(plans.physical.clone())
    }

    pub(crate) fn set_physical(&self, physical: Vec<Arc<PhysicalNode>>, duration: Duration) -> Result<()> {
        let mut plans = self.write_plans()?;
        plans.physical = physical;
        plans.planning_duration = duration;
        Ok(())
    }

    /// Time spent in the last planning run.
    pub fn planning_duration(&self) -> Duration {
        self.state
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .planning_duration
    }

    fn first_logical(&self) -> Result<Arc<LogicalNode>> {
        self.read_plans()?.logical.first().cloned().ok_or_else(|| {
            QueryError::invalid_query(format!("query {} has no logical plan", self.state.query_id))
        })
    }

    /// Columns produced by the query.
    pub fn output(&self) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.first_logical()?.columns().to_vec())
    }

    /// Order of the query's output, if it is sorted.
    pub fn order(&self) -> Result<Option<Vec<(ColumnDescriptor, SortOrder)>>> {
        Ok(self.first_logical()?.traits().order().map(|o| o.to_vec()))
    }

    /// Plans the registered logical plans, honouring the optimisation and
    /// plan cache hints.
    pub fn plan(&self, planner: &QueryPlanner) -> Result<()> {
        self.check_open()?;
        let hints = self.hints();
        if hints.no_optimisation() {
            planner.implement(self)
        } else {
            planner.plan(self, hints.bypass_plan_cache(), !hints.no_plan_cache_update())
        }
    }

    /// Implements the registered logical plans without optimisation.
    pub fn implement(&self, planner: &QueryPlanner) -> Result<()> {
        self.check_open()?;
        planner.implement(self)
    }

    /// A context sharing everything with this one but the bindings, which
    /// are copied.
    pub fn split(&self) -> QueryContext {
        QueryContext {
            state: self.state.clone(),
            bindings: self.bindings.clone(),
        }
    }

    /// Number of partitions allowed for this query as `(max, min)`, or
    /// `None` if it must run serially.
    fn parallelism(&self) -> Option<(usize, Option<usize>)> {
        if self.hints().no_parallel() {
            return None;
        }
        let workers = self.txn().available_intra_query_workers();
        let (min, max) = self.hints().parallelism().unwrap_or((None, workers));
        Some((max.min(workers), min))
    }

    /// Turns the first physical plan into an executable operator tree,
    /// partitioning it if that is expected to pay off.
    pub fn to_operator_tree(&self) -> Result<Operator> {
        let plan = self.physical()?.remove(0);
        let plan = match self.parallelism() {
            Some((max, min)) => {
                let mut next_group_id = || self.next_group_id();
                match plan.try_partition(self.cost_policy(), max, min, &mut next_group_id)? {
                    Some(partitioned) => {
                        debug!(
                            "query {} runs partitioned:\n{}",
                            self.query_id(),
                            partitioned.explain()
                        );
                        partitioned
                    }
                    None => plan,
                }
            }
            None => plan,
        };
        Operator::build(&plan, self)
    }

    /// Builds the operator tree and starts executing it.
    pub fn execute(&self, engine: &ExecutionEngine) -> Result<ResultStream> {
        let operator = self.to_operator_tree()?;
        engine.execute(operator, self)
    }

    /// Closes the context; every later access to its plans fails.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("query_id", &self.state.query_id)
            .field("tx_id", &self.state.txn.tx_id())
            .field("hints", &self.state.hints)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
