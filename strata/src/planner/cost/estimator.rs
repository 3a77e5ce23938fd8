/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::model::Cost;
use crate::planner::operators::{PhysicalKind, PhysicalNode, Projection};
use rustc_hash::FxHashMap;
use shared::{ColumnDescriptor, ValueStatistics};
use std::sync::Arc;

/// Size of a tuple id in bytes.
pub const TUPLE_ID_WIDTH: f64 = 8.0;

/// Estimates output sizes and the cost of a single physical node.
pub struct CostEstimator<'a> {
    statistics: &'a FxHashMap<ColumnDescriptor, ValueStatistics>,
}

impl<'a> CostEstimator<'a> {
    /// Creates an estimator over the statistics of the node's columns
    pub fn new(statistics: &'a FxHashMap<ColumnDescriptor, ValueStatistics>) -> Self {
        Self { statistics }
    }

    /// Width in bytes of a tuple made of the given columns
    pub fn tuple_width(&self, columns: &[ColumnDescriptor]) -> f64 {
        columns
            .iter()
            .map(|c| c.width(self.statistics.get(c).map(|s| s.avg_width)) as f64)
            .sum()
    }

    /// Estimates the number of tuples a node produces
    pub fn estimate_output_size(&self, kind: &PhysicalKind, inputs: &[Arc<PhysicalNode>]) -> i64 {
        let input_size = inputs.first().map(|i| i.output_size()).unwrap_or(0);
        match kind {
            PhysicalKind::EntityScan {
                entity, partition, ..
            } => partition.bounds(entity.row_count().max(0) as usize).len() as i64,
            PhysicalKind::IndexScan {
                index,
                predicate,
                partition,
                ..
            } => {
                let count = index.count(predicate).max(0) as f64;
                (count / partition.partitions.max(1) as f64).ceil() as i64
            }
            PhysicalKind::NearestNeighbourScan { predicate, .. } => predicate.k.max(0),
            PhysicalKind::Filter { predicate } | PhysicalKind::FilterOnSubSelect { predicate } => {
                let statistics = inputs
                    .first()
                    .map(|i| i.statistics())
                    .unwrap_or(self.statistics);
                (input_size as f64 * predicate.selectivity(statistics)).ceil() as i64
            }
            PhysicalKind::Limit { limit, skip } | PhysicalKind::LimitingSort { limit, skip, .. } => {
                input_size.saturating_sub(*skip).clamp(0, (*limit).max(0))
            }
            PhysicalKind::Projection(Projection::Count)
            | PhysicalKind::Delete { .. }
            | PhysicalKind::Update { .. } => 1,
            PhysicalKind::Merge => inputs.iter().map(|i| i.output_size()).sum(),
            PhysicalKind::Fetch { .. }
            | PhysicalKind::Function { .. }
            | PhysicalKind::Sort { .. }
            | PhysicalKind::Projection(Projection::Select(_)) => input_size,
        }
    }

    /// Estimates the cost of a node, excluding its inputs
    pub fn estimate_cost(
        &self,
        kind: &PhysicalKind,
        inputs: &[Arc<PhysicalNode>],
        columns: &[ColumnDescriptor],
        output_size: i64,
    ) -> Cost {
        let rows = inputs.first().map(|i| i.output_size()).unwrap_or(0) as f64;
        let output = output_size as f64;
        match kind {
            PhysicalKind::EntityScan { fetch, .. } => {
                (Cost::DISK_ACCESS_READ + Cost::MEMORY_ACCESS)
                    * (output * (TUPLE_ID_WIDTH + self.tuple_width(fetch)))
            }
            PhysicalKind::IndexScan {
                index,
                predicate,
                fetch,
                partition,
            } => {
                index.cost(predicate) / partition.partitions.max(1) as f64
                    + Cost::MEMORY_ACCESS * (output * self.tuple_width(fetch))
            }
            PhysicalKind::NearestNeighbourScan {
                index,
                predicate,
                fetch,
            } => index.nearest_cost(predicate) + Cost::MEMORY_ACCESS * (output * self.tuple_width(fetch)),
            PhysicalKind::Filter { predicate } => predicate.cpu_cost() * rows,
            PhysicalKind::Fetch { fetch, .. } => {
                (Cost::DISK_ACCESS_READ + Cost::MEMORY_ACCESS)
                    * (rows * (TUPLE_ID_WIDTH + self.tuple_width(fetch)))
            }
            PhysicalKind::Function { call } => call.cost() * rows,
            PhysicalKind::Sort { .. } => {
                let width = self.tuple_width(columns);
                (Cost::MEMORY_ACCESS * width + Cost::FLOP) * (rows * rows.max(2.0).log2())
                    + Cost::memory(rows * width)
            }
            PhysicalKind::LimitingSort { limit, skip, .. } => {
                let width = self.tuple_width(columns);
                let kept = limit.saturating_add(*skip).max(0) as f64;
                (Cost::MEMORY_ACCESS * width + Cost::FLOP) * (rows * kept.max(2.0).log2())
                    + Cost::memory(kept.min(rows) * width)
            }
            PhysicalKind::Limit { .. } => Cost::MEMORY_ACCESS * output,
            PhysicalKind::Projection(Projection::Select(selected)) => {
                Cost::MEMORY_ACCESS * (rows * selected.len() as f64)
            }
            PhysicalKind::Projection(Projection::Count) => Cost::MEMORY_ACCESS * rows,
            PhysicalKind::Delete { .. } => {
                (Cost::DISK_ACCESS_WRITE + Cost::MEMORY_ACCESS) * (rows * TUPLE_ID_WIDTH)
            }
            PhysicalKind::Update { values, .. } => {
                let targets: Vec<_> = values.iter().map(|(c, _)| c.clone()).collect();
                (Cost::DISK_ACCESS_WRITE + Cost::MEMORY_ACCESS)
                    * (rows * (TUPLE_ID_WIDTH + self.tuple_width(&targets)))
            }
            PhysicalKind::FilterOnSubSelect { predicate } => {
                let candidates = inputs.get(1).map(|i| i.output_size()).unwrap_or(0) as f64;
                predicate.cpu_cost() * rows + Cost::MEMORY_ACCESS * (rows * candidates)
            }
            PhysicalKind::Merge => Cost::MEMORY_ACCESS * output,
        }
    }
}
