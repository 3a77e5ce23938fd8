/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Storage-facing collaborators of the planner and the execution engine.
//!
//! The engine only sees entities, indexes, the catalogue and transactions
//! through these traits. `memory` provides in-memory implementations.

pub mod memory;

use crate::binding::BindingContext;
use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::planner::cost::{Cost, CostPolicy};
use crate::predicate::{BooleanPredicate, ProximityPredicate};
use shared::{ColumnDescriptor, Tuple, TupleId, Value, ValueStatistics};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A lazily evaluated stream of results handed out by storage.
pub type Cursor<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    BTree,
    Hash,
    Fulltext,
    /// Answers nearest-neighbour searches over a vector column.
    Vector,
}

/// Selects the `index`-th of `partitions` contiguous slices of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionRange {
    pub index: usize,
    pub partitions: usize,
}

impl PartitionRange {
    pub const FULL: PartitionRange = PartitionRange {
        index: 0,
        partitions: 1,
    };

    pub fn new(index: usize, partitions: usize) -> Self {
        PartitionRange { index, partitions }
    }

    pub fn is_partitioned(&self) -> bool {
        self.partitions > 1
    }

    /// Positions covered by this partition out of `total`.
    pub fn bounds(&self, total: usize) -> Range<usize> {
        let partitions = self.partitions.max(1);
        let start = total * self.index / partitions;
        let end = total * (self.index + 1) / partitions;
        start..end.min(total)
    }
}

impl Default for PartitionRange {
    fn default() -> Self {
        PartitionRange::FULL
    }
}

pub trait Entity: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn columns(&self) -> &[ColumnDescriptor];

    fn row_count(&self) -> i64;

    fn column_statistics(&self, column: &ColumnDescriptor) -> Option<ValueStatistics>;

    fn indexes(&self) -> Vec<Arc<dyn Index>>;

    /// Reads the given columns of every row in the partition.
    fn scan(&self, columns: &[ColumnDescriptor], range: PartitionRange) -> Result<Cursor<Tuple>>;

    /// Reads the given columns of a single row.
    fn read(&self, tuple_id: TupleId, columns: &[ColumnDescriptor]) -> Result<Tuple>;

    fn delete(&self, tuple_id: TupleId) -> Result<()>;

    fn update(&self, tuple_id: TupleId, values: &[(ColumnDescriptor, Value)]) -> Result<()>;
}

pub trait Index: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn index_type(&self) -> IndexType;

    /// Columns the index is built on.
    fn columns(&self) -> &[ColumnDescriptor];

    /// Columns returned alongside the tuple id by `filter`.
    fn produces(&self) -> &[ColumnDescriptor];

    fn is_exact(&self) -> bool {
        true
    }

    /// A dirty index is out of sync with its entity and must not be used.
    fn is_dirty(&self) -> bool {
        false
    }

    fn supports_partitioning(&self) -> bool {
        false
    }

    fn can_process(&self, predicate: &BooleanPredicate) -> bool;

    fn cost(&self, predicate: &BooleanPredicate) -> Cost;

    /// Estimated number of results for the predicate.
    fn count(&self, predicate: &BooleanPredicate) -> i64;

    fn filter(&self, predicate: &BooleanPredicate, bindings: &BindingContext) -> Result<Cursor<Tuple>>;

    fn filter_range(
        &self,
        predicate: &BooleanPredicate,
        bindings: &BindingContext,
        range: PartitionRange,
    ) -> Result<Cursor<Tuple>>;

    fn can_process_nearest(&self, _predicate: &ProximityPredicate) -> bool {
        false
    }

    /// Columns of the tuples returned by `nearest`: the distance followed by
    /// the produced columns.
    fn nearest_columns(&self, predicate: &ProximityPredicate) -> Vec<ColumnDescriptor> {
        let mut columns = vec![predicate.distance().clone()];
        columns.extend(self.produces().iter().cloned());
        columns
    }

    /// Only meaningful if `can_process_nearest` holds.
    fn nearest_cost(&self, _predicate: &ProximityPredicate) -> Cost {
        Cost::ZERO
    }

    /// Returns at most `k` tuples in rank order.
    fn nearest(&self, predicate: &ProximityPredicate, _bindings: &BindingContext) -> Result<Cursor<Tuple>> {
        Err(QueryError::internal(format!(
            "index {} cannot process {}",
            self.name(),
            predicate
        )))
    }
}

pub trait Catalogue: Send + Sync {
    fn entity(&self, name: &str) -> Result<Arc<dyn Entity>>;

    fn config(&self) -> &EngineConfig;

    fn default_cost_policy(&self) -> CostPolicy {
        self.config().cost.clone()
    }
}

pub trait Transaction: Send + Sync {
    fn tx_id(&self) -> i64;

    fn available_intra_query_workers(&self) -> usize;

    /// Opens a transactional handle on a database object. Resources are
    /// released when the handle is dropped.
    fn get_tx(&self, dbo: &str) -> Result<TxHandle>;
}

/// Guard for a database object opened within a transaction.
pub struct TxHandle {
    tx_id: i64,
    dbo: String,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl TxHandle {
    pub fn new(tx_id: i64, dbo: impl Into<String>) -> Self {
        TxHandle {
            tx_id,
            dbo: dbo.into(),
            on_release: None,
        }
    }

    /// Registers a callback invoked once the handle is dropped.
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(release));
        self
    }

    pub fn tx_id(&self) -> i64 {
        self.tx_id
    }

    pub fn dbo(&self) -> &str {
        &self.dbo
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("tx_id", &self.tx_id)
            .field("dbo", &self.dbo)
            .finish()
    }
}

impl Drop for TxHandle {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_bounds_cover_everything() {
        let total = 10;
        let mut covered = Vec::new();
        for index in 0..3 {
            covered.extend(PartitionRange::new(index, 3).bounds(total));
        }
        assert_eq!(covered, (0..10).collect::<Vec<_>>());
        assert_eq!(PartitionRange::FULL.bounds(total), 0..10);
        assert_eq!(PartitionRange::new(3, 4).bounds(2), 1..2);
    }

    #[test]
    fn test_tx_handle_release() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let handle = TxHandle::new(1, "t").on_release(move || flag.store(true, Ordering::SeqCst));
        assert_eq!(handle.dbo(), "t");
        drop(handle);
        assert!(released.load(Ordering::SeqCst));
    }
}
