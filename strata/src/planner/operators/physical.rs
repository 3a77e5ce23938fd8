/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::logical::{check_subselect, deleted_column, retain_order, updated_column, Projection};
use super::position::Position;
use super::traits::{Trait, TraitKind, Traits};
use super::{append_columns, check_arity, check_columns, private, Arity, DigestBuilder, PlanNode};
use crate::binding::Binding;
use crate::catalogue::{Entity, Index, PartitionRange};
use crate::error::{QueryError, Result};
use crate::function::FunctionCall;
use crate::planner::cost::{Cost, CostEstimator, CostPolicy};
use crate::predicate::{BooleanPredicate, ProximityPredicate};
use crate::{Digest, GroupId};
use log::debug;
use rustc_hash::FxHashMap;
use shared::{ColumnDescriptor, SortOrder, ValueStatistics};
use std::fmt::{self, Write};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum PhysicalKind {
    EntityScan {
        entity: Arc<dyn Entity>,
        fetch: Vec<ColumnDescriptor>,
        partition: PartitionRange,
    },
    /// Evaluates a predicate through an index, producing the columns in `fetch`.
    IndexScan {
        index: Arc<dyn Index>,
        predicate: BooleanPredicate,
        fetch: Vec<ColumnDescriptor>,
        partition: PartitionRange,
    },
    /// Asks an index for the nearest neighbours, producing the columns in
    /// `fetch` out of the distance and the columns the index stores.
    NearestNeighbourScan {
        index: Arc<dyn Index>,
        predicate: ProximityPredicate,
        fetch: Vec<ColumnDescriptor>,
    },
    Filter {
        predicate: BooleanPredicate,
    },
    Fetch {
        entity: Arc<dyn Entity>,
        fetch: Vec<ColumnDescriptor>,
    },
    Function {
        call: FunctionCall,
    },
    Sort {
        order: Vec<(ColumnDescriptor, SortOrder)>,
    },
    /// Sort that only keeps the first `skip + limit` tuples.
    LimitingSort {
        order: Vec<(ColumnDescriptor, SortOrder)>,
        limit: i64,
        skip: i64,
    },
    Limit {
        limit: i64,
        skip: i64,
    },
    Projection(Projection),
    Delete {
        entity: Arc<dyn Entity>,
    },
    Update {
        entity: Arc<dyn Entity>,
        values: Vec<(ColumnDescriptor, Binding)>,
    },
    FilterOnSubSelect {
        predicate: BooleanPredicate,
    },
    /// Concatenates the output of partitions of the same sub-plan.
    Merge,
}

impl PhysicalKind {
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalKind::EntityScan { .. } => "EntityScan",
            PhysicalKind::IndexScan { .. } => "IndexScan",
            PhysicalKind::NearestNeighbourScan { .. } => "NearestNeighbourScan",
            PhysicalKind::Filter { .. } => "Filter",
            PhysicalKind::Fetch { .. } => "Fetch",
            PhysicalKind::Function { .. } => "Function",
            PhysicalKind::Sort { .. } => "Sort",
            PhysicalKind::LimitingSort { .. } => "LimitingSort",
            PhysicalKind::Limit { .. } => "Limit",
            PhysicalKind::Projection(Projection::Select(_)) => "Select",
            PhysicalKind::Projection(Projection::Count) => "Count",
            PhysicalKind::Delete { .. } => "Delete",
            PhysicalKind::Update { .. } => "Update",
            PhysicalKind::FilterOnSubSelect { .. } => "FilterOnSubSelect",
            PhysicalKind::Merge => "Merge",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            PhysicalKind::EntityScan { .. }
            | PhysicalKind::IndexScan { .. }
            | PhysicalKind::NearestNeighbourScan { .. } => Arity::Nullary,
            PhysicalKind::FilterOnSubSelect { .. } => Arity::Binary,
            PhysicalKind::Merge => Arity::NAry,
            _ => Arity::Unary,
        }
    }

    fn hash_into(&self, digest: &mut DigestBuilder) {
        match self {
            PhysicalKind::EntityScan {
                entity,
                fetch,
                partition,
            } => {
                digest.write(entity.name()).write(fetch).write(partition);
            }
            PhysicalKind::IndexScan {
                index,
                predicate,
                fetch,
                partition,
            } => {
                digest
                    .write(index.name())
                    .write(predicate)
                    .write(fetch)
                    .write(partition);
            }
            PhysicalKind::NearestNeighbourScan {
                index,
                predicate,
                fetch,
            } => {
                digest.write(index.name()).write(predicate).write(fetch);
            }
            PhysicalKind::Filter { predicate } | PhysicalKind::FilterOnSubSelect { predicate } => {
                digest.write(predicate);
            }
            PhysicalKind::Fetch { entity, fetch } => {
                digest.write(entity.name()).write(fetch);
            }
            PhysicalKind::Function { call } => {
                digest.write(call);
            }
            PhysicalKind::Sort { order } => {
                digest.write(order);
            }
            PhysicalKind::LimitingSort { order, limit, skip } => {
                digest.write(order).write(limit).write(skip);
            }
            PhysicalKind::Limit { limit, skip } => {
                digest.write(limit).write(skip);
            }
            PhysicalKind::Projection(projection) => {
                digest.write(projection);
            }
            PhysicalKind::Delete { entity } => {
                digest.write(entity.name());
            }
            PhysicalKind::Update { entity, values } => {
                digest.write(entity.name()).write(values);
            }
            PhysicalKind::Merge => {}
        }
    }
}

#[derive(Debug)]
pub struct PhysicalNode {
    group_id: GroupId,
    kind: PhysicalKind,
    inputs: Vec<Arc<PhysicalNode>>,
    columns: Vec<ColumnDescriptor>,
    traits: Traits,
    digest: Digest,
    statistics: FxHashMap<ColumnDescriptor, ValueStatistics>,
    output_size: i64,
    cost: Cost,
    total_cost: Cost,
    parallelizable_cost: Cost,
    executable: bool,
}

impl private::Sealed for PhysicalNode {}

impl PhysicalNode {
    /// Creates a node, deriving its columns, traits, statistics and costs.
    /// Unary and binary nodes take the group of their first input.
    pub fn new(group_id: GroupId, kind: PhysicalKind, inputs: Vec<Arc<PhysicalNode>>) -> Result<Arc<Self>> {
        let name = kind.name();
        check_arity(name, kind.arity(), inputs.len())?;
        let group_id = match kind.arity() {
            Arity::Unary | Arity::Binary => inputs[0].group_id,
            Arity::Nullary | Arity::NAry => group_id,
        };
        let (columns, traits) = derive(&kind, &inputs)?;
        let statistics = derive_statistics(&kind, &inputs, &columns);

        let estimator = CostEstimator::new(&statistics);
        let output_size = estimator.estimate_output_size(&kind, &inputs);
        let cost = estimator.estimate_cost(&kind, &inputs, &columns, output_size);
        let total_cost = inputs.iter().map(|i| i.total_cost).sum::<Cost>() + cost;
        let own_parallelizable = if traits.contains(TraitKind::NotPartitionable) {
            Cost::ZERO
        } else {
            cost
        };
        let parallelizable_cost =
            inputs.iter().map(|i| i.parallelizable_cost).sum::<Cost>() + own_parallelizable;
        let executable = is_executable(&kind) && inputs.iter().all(|i| i.executable);

        let mut digest = DigestBuilder::new(name, group_id);
        kind.hash_into(&mut digest);
        let digest = digest.finish(&columns, &traits, &inputs);

        Ok(Arc::new(PhysicalNode {
            group_id,
            kind,
            inputs,
            columns,
            traits,
            digest,
            statistics,
            output_size,
            cost,
            total_cost,
            parallelizable_cost,
            executable,
        }))
    }

    pub fn entity_scan(
        group_id: GroupId,
        entity: Arc<dyn Entity>,
        fetch: Vec<ColumnDescriptor>,
    ) -> Result<Arc<Self>> {
        Self::new(
            group_id,
            PhysicalKind::EntityScan {
                entity,
                fetch,
                partition: PartitionRange::FULL,
            },
            vec![],
        )
    }

    pub fn index_scan(
        group_id: GroupId,
        index: Arc<dyn Index>,
        predicate: BooleanPredicate,
        fetch: Vec<ColumnDescriptor>,
    ) -> Result<Arc<Self>> {
        Self::new(
            group_id,
            PhysicalKind::IndexScan {
                index,
                predicate,
                fetch,
                partition: PartitionRange::FULL,
            },
            vec![],
        )
    }

    pub fn nearest_neighbour_scan(
        group_id: GroupId,
        index: Arc<dyn Index>,
        predicate: ProximityPredicate,
        fetch: Vec<ColumnDescriptor>,
    ) -> Result<Arc<Self>> {
        Self::new(
            group_id,
            PhysicalKind::NearestNeighbourScan {
                index,
                predicate,
                fetch,
            },
            vec![],
        )
    }

    pub fn filter(input: Arc<Self>, predicate: BooleanPredicate) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Filter { predicate }, vec![input])
    }

    pub fn fetch(input: Arc<Self>, entity: Arc<dyn Entity>, fetch: Vec<ColumnDescriptor>) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Fetch { entity, fetch }, vec![input])
    }

    pub fn function(input: Arc<Self>, call: FunctionCall) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Function { call }, vec![input])
    }

    pub fn sort(input: Arc<Self>, order: Vec<(ColumnDescriptor, SortOrder)>) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Sort { order }, vec![input])
    }

    pub fn limiting_sort(
        input: Arc<Self>,
        order: Vec<(ColumnDescriptor, SortOrder)>,
        limit: i64,
        skip: i64,
    ) -> Result<Arc<Self>> {
        Self::new(
            input.group_id,
            PhysicalKind::LimitingSort { order, limit, skip },
            vec![input],
        )
    }

    pub fn limit(input: Arc<Self>, limit: i64, skip: i64) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Limit { limit, skip }, vec![input])
    }

    pub fn select(input: Arc<Self>, columns: Vec<ColumnDescriptor>) -> Result<Arc<Self>> {
        Self::new(
            input.group_id,
            PhysicalKind::Projection(Projection::Select(columns)),
            vec![input],
        )
    }

    pub fn count(input: Arc<Self>) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Projection(Projection::Count), vec![input])
    }

    pub fn delete(input: Arc<Self>, entity: Arc<dyn Entity>) -> Result<Arc<Self>> {
        Self::new(input.group_id, PhysicalKind::Delete { entity }, vec![input])
    }

    pub fn merge(group_id: GroupId, inputs: Vec<Arc<Self>>) -> Result<Arc<Self>> {
        Self::new(group_id, PhysicalKind::Merge, inputs)
    }

    pub fn kind(&self) -> &PhysicalKind {
        &self.kind
    }

    pub fn statistics(&self) -> &FxHashMap<ColumnDescriptor, ValueStatistics> {
        &self.statistics
    }

    /// Estimated number of tuples produced.
    pub fn output_size(&self) -> i64 {
        self.output_size
    }

    /// Cost of this node alone.
    pub fn cost(&self) -> Cost {
        self.cost
    }

    /// Cost of this node and everything below it.
    pub fn total_cost(&self) -> Cost {
        self.total_cost
    }

    /// Part of the total cost that benefits from partitioning.
    pub fn parallelizable_cost(&self) -> Cost {
        self.parallelizable_cost
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// Executability restricted to the nodes of one group; sub-plans of other
    /// groups are replaced by their own best plan later.
    pub fn is_executable_in_group(&self, group_id: GroupId) -> bool {
        if self.group_id != group_id {
            return true;
        }
        is_executable(&self.kind) && self.inputs.iter().all(|i| i.is_executable_in_group(group_id))
    }

    /// Whether this node processes each tuple independently of all others.
    pub fn is_row_local(&self) -> bool {
        matches!(
            self.kind,
            PhysicalKind::Filter { .. }
                | PhysicalKind::Fetch { .. }
                | PhysicalKind::Function { .. }
                | PhysicalKind::Projection(Projection::Select(_))
        )
    }

    fn is_partitionable_source(&self) -> bool {
        match &self.kind {
            PhysicalKind::EntityScan { partition, .. } => !partition.is_partitioned(),
            PhysicalKind::IndexScan { index, partition, .. } => {
                !partition.is_partitioned() && index.supports_partitioning()
            }
            _ => false,
        }
    }

    /// A chain of row-local nodes on top of a partitionable source.
    fn is_partitionable_chain(&self) -> bool {
        match self.kind.arity() {
            Arity::Nullary => self.is_partitionable_source(),
            Arity::Unary => self.is_row_local() && self.inputs[0].is_partitionable_chain(),
            _ => false,
        }
    }

    /// Splits the highest partitionable chain of this tree into partitions
    /// joined by a merge. Returns `None` if the tree must run serially.
    ///
    /// The number of partitions follows the cost policy, capped at `max`;
    /// `min` raises it regardless of cost.
    pub fn try_partition(
        self: &Arc<Self>,
        policy: &CostPolicy,
        max: usize,
        min: Option<usize>,
        next_group_id: &mut dyn FnMut() -> GroupId,
    ) -> Result<Option<Arc<PhysicalNode>>> {
        if self.any(&|n: &PhysicalNode| n.has_trait(TraitKind::NotPartitionable)) {
            return Ok(None);
        }

        let mut position = Position::root(self.clone());
        while !position.node().is_partitionable_chain() {
            match position.node().arity() {
                Arity::Unary => match position.child(0) {
                    Some(child) => position = child,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
        }

        let segment = position.node().clone();
        let mut partitions =
            policy.parallelisation(&segment.parallelizable_cost, &self.total_cost, max);
        if let Some(min) = min {
            partitions = partitions.max(min);
        }
        if partitions < 2 {
            return Ok(None);
        }

        debug!(
            "partitioning {} (group {}) into {} partitions",
            segment.name(),
            segment.group_id,
            partitions
        );
        let inbound = (0..partitions)
            .map(|index| segment.partition(partitions, index, next_group_id()))
            .collect::<Result<Vec<_>>>()?;
        let merge = PhysicalNode::merge(segment.group_id, inbound)?;
        position.replace(merge).map(Some)
    }

    /// Copies a partitionable chain, restricting its source to one partition.
    fn partition(&self, partitions: usize, index: usize, group_id: GroupId) -> Result<Arc<Self>> {
        let range = PartitionRange::new(index, partitions);
        match &self.kind {
            PhysicalKind::EntityScan { entity, fetch, .. } => Self::new(
                group_id,
                PhysicalKind::EntityScan {
                    entity: entity.clone(),
                    fetch: fetch.clone(),
                    partition: range,
                },
                vec![],
            ),
            PhysicalKind::IndexScan {
                index: idx,
                predicate,
                fetch,
                ..
            } => Self::new(
                group_id,
                PhysicalKind::IndexScan {
                    index: idx.clone(),
                    predicate: predicate.clone(),
                    fetch: fetch.clone(),
                    partition: range,
                },
                vec![],
            ),
            _ if self.is_row_local() => {
                let input = self.inputs[0].partition(partitions, index, group_id)?;
                self.copy_with_inputs(vec![input])
            }
            _ => Err(QueryError::internal(format!("{} cannot be partitioned", self.name()))),
        }
    }

    /// Human readable rendering of the tree, one node per line.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{}{}", "  ".repeat(depth), self.name());
        let _ = match &self.kind {
            PhysicalKind::EntityScan { entity, partition, .. } if partition.is_partitioned() => {
                write!(out, " {} [{}/{}]", entity.name(), partition.index + 1, partition.partitions)
            }
            PhysicalKind::EntityScan { entity, .. } | PhysicalKind::Fetch { entity, .. } => {
                write!(out, " {}", entity.name())
            }
            PhysicalKind::IndexScan { index, predicate, .. } => {
                write!(out, " {} ({})", index.name(), predicate)
            }
            PhysicalKind::NearestNeighbourScan { index, predicate, .. } => {
                write!(out, " {} ({})", index.name(), predicate)
            }
            PhysicalKind::Filter { predicate } | PhysicalKind::FilterOnSubSelect { predicate } => {
                write!(out, " ({})", predicate)
            }
            PhysicalKind::Limit { limit, skip } | PhysicalKind::LimitingSort { limit, skip, .. } => {
                write!(out, " limit={} skip={}", limit, skip)
            }
            _ => Ok(()),
        };
        let columns: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(
            out,
            " [{}] group={} rows={} cost=({:.3e}, {:.3e}, {:.3e})",
            columns.join(", "),
            self.group_id,
            self.output_size,
            self.total_cost.io,
            self.total_cost.cpu,
            self.total_cost.memory
        );
        for input in &self.inputs {
            input.explain_into(out, depth + 1);
        }
    }
}

fn is_executable(kind: &PhysicalKind) -> bool {
    match kind {
        PhysicalKind::Filter { predicate } | PhysicalKind::FilterOnSubSelect { predicate } => {
            predicate.is_linearly_evaluable()
        }
        _ => true,
    }
}

/// Derives and validates the output columns and traits of a physical node.
fn derive(kind: &PhysicalKind, inputs: &[Arc<PhysicalNode>]) -> Result<(Vec<ColumnDescriptor>, Traits)> {
    let name = kind.name();
    let input = inputs.first();
    let input_columns = input.map(|i| i.columns.as_slice()).unwrap_or(&[]);
    let inherited = input.map(|i| i.traits.inherited()).unwrap_or_default();

    let (columns, traits) = match kind {
        PhysicalKind::EntityScan {
            entity,
            fetch,
            partition,
        } => {
            check_columns(name, entity.columns(), fetch)?;
            (append_columns(name, &[], fetch)?, source_traits(partition))
        }
        PhysicalKind::IndexScan {
            index,
            predicate,
            fetch,
            partition,
        } => {
            if !index.can_process(predicate) {
                return Err(QueryError::RuleMisapplied {
                    rule: "IndexScan",
                    node: "Filter",
                });
            }
            check_columns(name, index.produces(), fetch)?;
            (append_columns(name, &[], fetch)?, source_traits(partition))
        }
        PhysicalKind::NearestNeighbourScan {
            index,
            predicate,
            fetch,
        } => {
            if !index.can_process_nearest(predicate) {
                return Err(QueryError::RuleMisapplied {
                    rule: "NearestNeighbourScan",
                    node: "Function",
                });
            }
            check_columns(name, &index.nearest_columns(predicate), fetch)?;
            (append_columns(name, &[], fetch)?, Traits::new())
        }
        PhysicalKind::Filter { predicate } => {
            check_columns(name, input_columns, &predicate.columns())?;
            (input_columns.to_vec(), inherited)
        }
        PhysicalKind::Fetch { entity, fetch } => {
            if fetch.is_empty() {
                return Err(QueryError::invalid_query("Fetch requires at least one column"));
            }
            check_columns(name, entity.columns(), fetch)?;
            (append_columns(name, input_columns, fetch)?, inherited)
        }
        PhysicalKind::Function { call } => {
            check_columns(name, input_columns, &call.columns())?;
            (
                append_columns(name, input_columns, std::slice::from_ref(&call.out))?,
                inherited,
            )
        }
        PhysicalKind::Sort { order } => {
            let order_columns: Vec<_> = order.iter().map(|(c, _)| c.clone()).collect();
            check_columns(name, input_columns, &order_columns)?;
            (input_columns.to_vec(), inherited.with(Trait::Order(order.clone())))
        }
        PhysicalKind::LimitingSort { order, limit, skip } => {
            let order_columns: Vec<_> = order.iter().map(|(c, _)| c.clone()).collect();
            check_columns(name, input_columns, &order_columns)?;
            check_limit(*limit, *skip)?;
            (
                input_columns.to_vec(),
                inherited
                    .with(Trait::Order(order.clone()))
                    .with(Trait::Limit { limit: *limit }),
            )
        }
        PhysicalKind::Limit { limit, skip } => {
            check_limit(*limit, *skip)?;
            (input_columns.to_vec(), inherited.with(Trait::Limit { limit: *limit }))
        }
        PhysicalKind::Projection(Projection::Select(columns)) => {
            check_columns(name, input_columns, columns)?;
            (append_columns(name, &[], columns)?, retain_order(inherited, columns))
        }
        PhysicalKind::Projection(Projection::Count) => (
            vec![Projection::count_column()],
            Traits::new().with(Trait::NotPartitionable),
        ),
        PhysicalKind::Delete { .. } => (
            vec![deleted_column()],
            Traits::new().with(Trait::NotPartitionable),
        ),
        PhysicalKind::Update { entity, values } => {
            let targets: Vec<_> = values.iter().map(|(c, _)| c.clone()).collect();
            check_columns(name, entity.columns(), &targets)?;
            let read: Vec<_> = values.iter().filter_map(|(_, b)| b.column().cloned()).collect();
            check_columns(name, input_columns, &read)?;
            (
                vec![updated_column()],
                Traits::new().with(Trait::NotPartitionable),
            )
        }
        PhysicalKind::FilterOnSubSelect { predicate } => {
            check_subselect(inputs, predicate)?;
            (input_columns.to_vec(), inherited)
        }
        PhysicalKind::Merge => {
            if inputs.iter().any(|i| i.columns != input_columns) {
                return Err(QueryError::internal("Merge inputs must produce the same columns"));
            }
            (input_columns.to_vec(), Traits::new())
        }
    };
    Ok((columns, traits))
}

fn source_traits(partition: &PartitionRange) -> Traits {
    if partition.is_partitioned() {
        Traits::new().with(Trait::NotPartitionable)
    } else {
        Traits::new()
    }
}

fn check_limit(limit: i64, skip: i64) -> Result<()> {
    if limit < 0 || skip < 0 {
        Err(QueryError::invalid_query("LIMIT and SKIP must not be negative"))
    } else {
        Ok(())
    }
}

/// Statistics for the output columns, taken from storage for freshly read
/// columns and from the input otherwise.
fn derive_statistics(
    kind: &PhysicalKind,
    inputs: &[Arc<PhysicalNode>],
    columns: &[ColumnDescriptor],
) -> FxHashMap<ColumnDescriptor, ValueStatistics> {
    let mut statistics = FxHashMap::default();
    if let Some(input) = inputs.first() {
        for column in columns {
            if let Some(stats) = input.statistics.get(column) {
                statistics.insert(column.clone(), stats.clone());
            }
        }
    }
    let read_from: Option<(&Arc<dyn Entity>, &[ColumnDescriptor])> = match kind {
        PhysicalKind::EntityScan { entity, fetch, .. } | PhysicalKind::Fetch { entity, fetch } => {
            Some((entity, fetch.as_slice()))
        }
        _ => None,
    };
    if let Some((entity, fetch)) = read_from {
        for column in fetch {
            if let Some(stats) = entity.column_statistics(column) {
                statistics.insert(column.clone(), stats);
            }
        }
    }
    statistics
}

impl PlanNode for PhysicalNode {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn group_id(&self) -> GroupId {
        self.group_id
    }

    fn arity(&self) -> Arity {
        self.kind.arity()
    }

    fn inputs(&self) -> &[Arc<Self>] {
        &self.inputs
    }

    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn requires(&self) -> Vec<ColumnDescriptor> {
        match &self.kind {
            PhysicalKind::Filter { predicate } | PhysicalKind::FilterOnSubSelect { predicate } => {
                predicate.columns()
            }
            PhysicalKind::Function { call } => call.columns(),
            PhysicalKind::Sort { order } | PhysicalKind::LimitingSort { order, .. } => {
                order.iter().map(|(c, _)| c.clone()).collect()
            }
            PhysicalKind::Projection(Projection::Select(columns)) => columns.clone(),
            PhysicalKind::Update { values, .. } => {
                values.iter().filter_map(|(_, b)| b.column().cloned()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn traits(&self) -> &Traits {
        &self.traits
    }

    fn digest(&self) -> Digest {
        self.digest
    }

    fn copy_with_inputs(&self, inputs: Vec<Arc<Self>>) -> Result<Arc<Self>> {
        Self::new(self.group_id, self.kind.clone(), inputs)
    }
}

impl fmt::Display for PhysicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name(), self.group_id)?;
        if !self.inputs.is_empty() {
            let inputs: Vec<String> = self.inputs.iter().map(|i| i.to_string()).collect();
            write!(f, "({})", inputs.join(", "))?;
        }
        Ok(())
    }
}
