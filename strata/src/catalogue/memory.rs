/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! In-memory catalogue, entities, indexes and transactions.

use super::{Catalogue, Cursor, Entity, Index, IndexType, PartitionRange, Transaction, TxHandle};
use crate::binding::{Binding, BindingContext};
use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::planner::cost::Cost;
use crate::predicate::{BooleanPredicate, ComparisonOperator, PatternCache, ProximityPredicate};
use rustc_hash::FxHashMap;
use shared::{ColumnDescriptor, SortOrder, Tuple, TupleId, Value, ValueStatistics};
use std::cmp::Ordering as Rank;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type Rows = Vec<Option<Vec<Value>>>;

#[derive(Debug)]
struct Table {
    columns: Arc<[ColumnDescriptor]>,
    rows: RwLock<Rows>,
    open_cursors: AtomicUsize,
    scanned: AtomicU64,
    reads: AtomicU64,
}

impl Table {
    fn position(&self, column: &ColumnDescriptor) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| QueryError::storage(format!("unknown column {}", column.name)))
    }

    fn positions(&self, columns: &[ColumnDescriptor]) -> Result<Vec<usize>> {
        columns.iter().map(|c| self.position(c)).collect()
    }

    fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn live_rows(&self) -> usize {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.is_some())
            .count()
    }

    fn statistics(&self, position: usize) -> ValueStatistics {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let logical_type = self.columns[position].logical_type;
        ValueStatistics::from_values(logical_type, rows.iter().flatten().map(|row| &row[position]))
    }
}

/// Tracks a cursor opened on a table for as long as it is alive.
struct CursorGuard {
    table: Arc<Table>,
}

impl CursorGuard {
    fn new(table: &Arc<Table>) -> Self {
        table.open_cursors.fetch_add(1, Ordering::SeqCst);
        CursorGuard {
            table: table.clone(),
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.table.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Walks the rows of a table lazily, one row per call, optionally filtering.
struct TableCursor {
    guard: CursorGuard,
    positions: Vec<usize>,
    layout: Arc<[ColumnDescriptor]>,
    next: usize,
    end: usize,
    filter: Option<Box<dyn FnMut(&[Value]) -> Result<bool> + Send>>,
}

impl Iterator for TableCursor {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let tuple_id = self.next;
            self.next += 1;
            let table = &self.guard.table;
            let rows = table.rows.read().unwrap_or_else(PoisonError::into_inner);
            let Some(Some(row)) = rows.get(tuple_id) else {
                continue;
            };
            if let Some(filter) = self.filter.as_mut() {
                match filter(row) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }
            table.scanned.fetch_add(1, Ordering::Relaxed);
            let values = self.positions.iter().map(|p| row[*p].clone()).collect();
            return Some(Ok(Tuple::new(tuple_id as TupleId, self.layout.clone(), values)));
        }
        None
    }
}

#[derive(Debug)]
pub struct MemoryEntity {
    name: String,
    table: Arc<Table>,
    indexes: RwLock<Vec<Arc<MemoryIndex>>>,
}

impl MemoryEntity {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        MemoryEntity {
            name: name.into(),
            table: Arc::new(Table {
                columns: columns.into(),
                rows: RwLock::new(Vec::new()),
                open_cursors: AtomicUsize::new(0),
                scanned: AtomicU64::new(0),
                reads: AtomicU64::new(0),
            }),
            indexes: RwLock::new(Vec::new()),
        }
    }

    fn check_row(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.table.columns.len() {
            return Err(QueryError::storage(format!(
                "{} expects {} values but got {}",
                self.name,
                self.table.columns.len(),
                values.len()
            )));
        }
        for (column, value) in self.table.columns.iter().zip(values) {
            check_value(column, value)?;
        }
        Ok(())
    }

    /// Appends a row and returns its tuple id.
    pub fn insert(&self, values: Vec<Value>) -> Result<TupleId> {
        self.check_row(&values)?;
        let mut rows = self.table.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.push(Some(values));
        Ok((rows.len() - 1) as TupleId)
    }

    pub fn create_index(
        &self,
        name: &str,
        column: &ColumnDescriptor,
        index_type: IndexType,
    ) -> Result<Arc<MemoryIndex>> {
        self.create_index_with(name, column, index_type, true)
    }

    pub fn create_index_with(
        &self,
        name: &str,
        column: &ColumnDescriptor,
        index_type: IndexType,
        exact: bool,
    ) -> Result<Arc<MemoryIndex>> {
        let position = self.table.position(column)?;
        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        if indexes.iter().any(|i| i.name == name) {
            return Err(QueryError::invalid_query(format!("index {} already exists", name)));
        }
        let index = Arc::new(MemoryIndex {
            name: name.to_string(),
            index_type,
            columns: vec![column.clone()],
            position,
            exact,
            dirty: AtomicBool::new(false),
            table: self.table.clone(),
        });
        indexes.push(index.clone());
        Ok(index)
    }

    /// Number of cursors currently open on this entity or its indexes.
    pub fn open_cursors(&self) -> usize {
        self.table.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of rows handed out by scans and index lookups.
    pub fn scanned_rows(&self) -> u64 {
        self.table.scanned.load(Ordering::Relaxed)
    }

    /// Number of single-row reads, i.e. fetches.
    pub fn reads(&self) -> u64 {
        self.table.reads.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<(TupleId, Vec<Value>)> {
        let rows = self.table.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.iter()
            .enumerate()
            .filter_map(|(id, row)| row.as_ref().map(|r| (id as TupleId, r.clone())))
            .collect()
    }
}

fn check_value(column: &ColumnDescriptor, value: &Value) -> Result<()> {
    if value.is_null() && !column.nullable {
        return Err(QueryError::type_mismatch(format!(
            "column {} is not nullable",
            column.name
        )));
    }
    if !value.fits(column.logical_type) {
        return Err(QueryError::type_mismatch(format!(
            "cannot store {} in column {}",
            value, column
        )));
    }
    Ok(())
}

impl Entity for MemoryEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[ColumnDescriptor] {
        &self.table.columns
    }

    fn row_count(&self) -> i64 {
        self.table.live_rows() as i64
    }

    fn column_statistics(&self, column: &ColumnDescriptor) -> Option<ValueStatistics> {
        let position = self.table.position(column).ok()?;
        Some(self.table.statistics(position))
    }

    fn indexes(&self) -> Vec<Arc<dyn Index>> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|i| i.clone() as Arc<dyn Index>)
            .collect()
    }

    fn scan(&self, columns: &[ColumnDescriptor], range: PartitionRange) -> Result<Cursor<Tuple>> {
        let positions = self.table.positions(columns)?;
        let bounds = range.bounds(self.table.len());
        Ok(Box::new(TableCursor {
            guard: CursorGuard::new(&self.table),
            positions,
            layout: columns.to_vec().into(),
            next: bounds.start,
            end: bounds.end,
            filter: None,
        }))
    }

    fn read(&self, tuple_id: TupleId, columns: &[ColumnDescriptor]) -> Result<Tuple> {
        let positions = self.table.positions(columns)?;
        let rows = self.table.rows.read().unwrap_or_else(PoisonError::into_inner);
        let row = usize::try_from(tuple_id)
            .ok()
            .and_then(|id| rows.get(id))
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                QueryError::storage(format!("tuple {} does not exist in {}", tuple_id, self.name))
            })?;
        self.table.reads.fetch_add(1, Ordering::Relaxed);
        let values = positions.iter().map(|p| row[*p].clone()).collect();
        Ok(Tuple::new(tuple_id, columns.to_vec().into(), values))
    }

    fn delete(&self, tuple_id: TupleId) -> Result<()> {
        let mut rows = self.table.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = usize::try_from(tuple_id)
            .ok()
            .and_then(|id| rows.get_mut(id))
            .filter(|row| row.is_some())
            .ok_or_else(|| {
                QueryError::storage(format!("tuple {} does not exist in {}", tuple_id, self.name))
            })?;
        *row = None;
        Ok(())
    }

    fn update(&self, tuple_id: TupleId, values: &[(ColumnDescriptor, Value)]) -> Result<()> {
        let mut changes = Vec::with_capacity(values.len());
        for (column, value) in values {
            check_value(column, value)?;
            changes.push((self.table.position(column)?, value.clone()));
        }
        let mut rows = self.table.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = usize::try_from(tuple_id)
            .ok()
            .and_then(|id| rows.get_mut(id))
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                QueryError::storage(format!("tuple {} does not exist in {}", tuple_id, self.name))
            })?;
        for (position, value) in changes {
            row[position] = value;
        }
        Ok(())
    }
}

/// A single-column index answering predicates by walking the table.
#[derive(Debug)]
pub struct MemoryIndex {
    name: String,
    index_type: IndexType,
    columns: Vec<ColumnDescriptor>,
    position: usize,
    exact: bool,
    dirty: AtomicBool,
    table: Arc<Table>,
}

impl MemoryIndex {
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    fn supports(&self, operator: ComparisonOperator) -> bool {
        use ComparisonOperator::*;
        match self.index_type {
            IndexType::BTree => matches!(
                operator,
                Equal | Greater | GreaterEqual | Less | LessEqual | Between | In | IsNull
            ),
            IndexType::Hash => matches!(operator, Equal | In),
            IndexType::Fulltext => matches!(operator, Like | Match),
            IndexType::Vector => false,
        }
    }

    fn lookup_steps(&self) -> f64 {
        let rows = self.table.live_rows() as f64;
        match self.index_type {
            IndexType::Hash => 1.0,
            IndexType::BTree => (rows + 1.0).log2().max(1.0),
            IndexType::Fulltext => 2.0 * (rows + 1.0).log2().max(1.0),
            IndexType::Vector => rows,
        }
    }
}

impl Index for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn index_type(&self) -> IndexType {
        self.index_type
    }

    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn produces(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn is_exact(&self) -> bool {
        self.exact
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn supports_partitioning(&self) -> bool {
        self.index_type == IndexType::BTree
    }

    fn can_process(&self, predicate: &BooleanPredicate) -> bool {
        match predicate {
            BooleanPredicate::Atomic { comparison, not } => {
                !not
                    && comparison.left == self.columns[0]
                    && comparison.right.iter().all(Binding::is_literal)
                    && self.supports(comparison.operator)
            }
            _ => false,
        }
    }

    fn cost(&self, predicate: &BooleanPredicate) -> Cost {
        let width = 8.0 + self.columns[0].logical_type.physical_size() as f64;
        let count = self.count(predicate) as f64;
        Cost::DISK_ACCESS_READ * (self.lookup_steps() * width)
            + (Cost::DISK_ACCESS_READ + Cost::MEMORY_ACCESS) * (count * width)
            + Cost::memory(width)
    }

    fn count(&self, predicate: &BooleanPredicate) -> i64 {
        let mut statistics = FxHashMap::default();
        statistics.insert(self.columns[0].clone(), self.table.statistics(self.position));
        let rows = self.table.live_rows() as f64;
        (rows * predicate.selectivity(&statistics)).ceil() as i64
    }

    fn filter(&self, predicate: &BooleanPredicate, bindings: &BindingContext) -> Result<Cursor<Tuple>> {
        self.filter_range(predicate, bindings, PartitionRange::FULL)
    }

    fn filter_range(
        &self,
        predicate: &BooleanPredicate,
        bindings: &BindingContext,
        range: PartitionRange,
    ) -> Result<Cursor<Tuple>> {
        if !self.can_process(predicate) {
            return Err(QueryError::internal(format!(
                "index {} cannot process {}",
                self.name, predicate
            )));
        }
        if range.is_partitioned() && !self.supports_partitioning() {
            return Err(QueryError::internal(format!(
                "index {} does not support partitioning",
                self.name
            )));
        }

        let layout: Arc<[ColumnDescriptor]> = self.columns.clone().into();
        let position = self.position;
        let predicate = predicate.clone();
        let bindings = bindings.clone();
        let mut patterns = PatternCache::new();
        let row_layout = layout.clone();
        let filter = move |row: &[Value]| -> Result<bool> {
            let single = Tuple::new(0, row_layout.clone(), vec![row[position].clone()]);
            match &predicate {
                BooleanPredicate::Atomic { comparison, .. }
                    if comparison.operator == ComparisonOperator::Match =>
                {
                    let query = bindings.resolve(&comparison.right[0], &single)?;
                    Ok(full_text_match(&row[position], query))
                }
                _ => predicate.is_match(&single, &bindings, &mut patterns),
            }
        };

        let bounds = range.bounds(self.table.len());
        Ok(Box::new(TableCursor {
            guard: CursorGuard::new(&self.table),
            positions: vec![position],
            layout,
            next: bounds.start,
            end: bounds.end,
            filter: Some(Box::new(filter)),
        }))
    }

    fn can_process_nearest(&self, predicate: &ProximityPredicate) -> bool {
        self.index_type == IndexType::Vector && predicate.column == self.columns[0]
    }

    fn nearest_cost(&self, predicate: &ProximityPredicate) -> Cost {
        let rows = self.lookup_steps();
        let width = self.columns[0].logical_type.physical_size() as f64;
        let kept = (predicate.k as f64).min(rows);
        Cost::MEMORY_ACCESS * (rows * width)
            + predicate.call.cost() * rows
            + Cost::memory(kept * (8.0 + width))
    }

    /// Ranks every row. Ties keep tuple id order.
    fn nearest(&self, predicate: &ProximityPredicate, bindings: &BindingContext) -> Result<Cursor<Tuple>> {
        if !self.can_process_nearest(predicate) {
            return Err(QueryError::internal(format!(
                "index {} cannot process {}",
                self.name, predicate
            )));
        }

        let row_layout: Arc<[ColumnDescriptor]> = self.columns.clone().into();
        let mut ranked = Vec::new();
        {
            let rows = self.table.rows.read().unwrap_or_else(PoisonError::into_inner);
            for (tuple_id, row) in rows.iter().enumerate() {
                let Some(row) = row else {
                    continue;
                };
                let vector = row[self.position].clone();
                let single = Tuple::new(tuple_id as TupleId, row_layout.clone(), vec![vector.clone()]);
                let distance = predicate.call.evaluate(&single, bindings)?;
                ranked.push((tuple_id as TupleId, distance, vector));
            }
        }
        ranked.sort_by(|a, b| rank(&a.1, &b.1, predicate.order).then(a.0.cmp(&b.0)));
        ranked.truncate(usize::try_from(predicate.k).unwrap_or(usize::MAX));
        self.table.scanned.fetch_add(ranked.len() as u64, Ordering::Relaxed);

        let layout: Arc<[ColumnDescriptor]> = self.nearest_columns(predicate).into();
        Ok(Box::new(ranked.into_iter().map(move |(tuple_id, distance, vector)| {
            Ok(Tuple::new(tuple_id, layout.clone(), vec![distance, vector]))
        })))
    }
}

/// Orders distances by `order`, nulls after every value.
fn rank(a: &Value, b: &Value, order: SortOrder) -> Rank {
    match (a.is_null(), b.is_null()) {
        (true, true) => Rank::Equal,
        (true, false) => Rank::Greater,
        (false, true) => Rank::Less,
        (false, false) => {
            let ordering = a.compare(b).unwrap_or(Rank::Equal);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        }
    }
}

/// Every whitespace separated term of the query must occur in the text.
fn full_text_match(text: &Value, query: &Value) -> bool {
    match (text.as_str(), query.as_str()) {
        (Some(text), Some(query)) => {
            let text = text.to_lowercase();
            let mut terms = query.split_whitespace().peekable();
            terms.peek().is_some() && terms.all(|term| text.contains(&term.to_lowercase()))
        }
        _ => false,
    }
}

pub struct MemoryCatalogue {
    config: EngineConfig,
    entities: RwLock<FxHashMap<String, Arc<MemoryEntity>>>,
}

impl MemoryCatalogue {
    pub fn new(config: EngineConfig) -> Self {
        MemoryCatalogue {
            config,
            entities: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn create_entity(&self, name: &str, columns: Vec<ColumnDescriptor>) -> Result<Arc<MemoryEntity>> {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        if entities.contains_key(name) {
            return Err(QueryError::invalid_query(format!("entity {} already exists", name)));
        }
        let entity = Arc::new(MemoryEntity::new(name, columns));
        entities.insert(name.to_string(), entity.clone());
        Ok(entity)
    }

    pub fn memory_entity(&self, name: &str) -> Option<Arc<MemoryEntity>> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl Default for MemoryCatalogue {
    fn default() -> Self {
        MemoryCatalogue::new(EngineConfig::default())
    }
}

impl Catalogue for MemoryCatalogue {
    fn entity(&self, name: &str) -> Result<Arc<dyn Entity>> {
        self.memory_entity(name)
            .map(|e| e as Arc<dyn Entity>)
            .ok_or_else(|| QueryError::UnknownEntity(name.to_string()))
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// A transaction that only keeps track of the handles it hands out.
#[derive(Debug)]
pub struct MemoryTransaction {
    tx_id: i64,
    workers: usize,
    active: Arc<AtomicUsize>,
}

impl MemoryTransaction {
    pub fn new(tx_id: i64, workers: usize) -> Self {
        MemoryTransaction {
            tx_id,
            workers,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of handles that have not been released yet.
    pub fn active_handles(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Transaction for MemoryTransaction {
    fn tx_id(&self) -> i64 {
        self.tx_id
    }

    fn available_intra_query_workers(&self) -> usize {
        self.workers
    }

    fn get_tx(&self, dbo: &str) -> Result<TxHandle> {
        self.active.fetch_add(1, Ordering::SeqCst);
        let active = self.active.clone();
        Ok(TxHandle::new(self.tx_id, dbo).on_release(move || {
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Type;

    fn create_test_entity() -> (MemoryCatalogue, Arc<MemoryEntity>, ColumnDescriptor, ColumnDescriptor) {
        let catalogue = MemoryCatalogue::default();
        let id = ColumnDescriptor::qualified("t", "id", Type::Long, false);
        let name = ColumnDescriptor::qualified("t", "name", Type::String, true);
        let entity = catalogue.create_entity("t", vec![id.clone(), name.clone()]).unwrap();
        for i in 0..10 {
            entity
                .insert(vec![Value::Long(i % 5), Value::String(format!("row number {}", i))])
                .unwrap();
        }
        (catalogue, entity, id, name)
    }

    #[test]
    fn test_scan_and_read() {
        let (_, entity, id, name) = create_test_entity();
        let tuples: Vec<Tuple> = entity
            .scan(&[name.clone()], PartitionRange::FULL)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(tuples.len(), 10);
        assert_eq!(tuples[3].get(&name), Some(&Value::String("row number 3".into())));
        assert_eq!(entity.read(7, &[id.clone()]).unwrap().get(&id), Some(&Value::Long(2)));
        assert_eq!(entity.reads(), 1);
        assert_eq!(entity.open_cursors(), 0);
    }

    #[test]
    fn test_cursor_is_tracked() {
        let (_, entity, id, _) = create_test_entity();
        let cursor = entity.scan(&[id], PartitionRange::new(1, 2)).unwrap();
        assert_eq!(entity.open_cursors(), 1);
        assert_eq!(cursor.count(), 5);
        assert_eq!(entity.open_cursors(), 0);
    }

    #[test]
    fn test_delete_and_update() {
        let (_, entity, id, name) = create_test_entity();
        entity.delete(0).unwrap();
        assert!(entity.delete(0).is_err());
        assert_eq!(entity.row_count(), 9);
        entity.update(1, &[(id.clone(), Value::Long(100))]).unwrap();
        assert_eq!(entity.read(1, &[id.clone()]).unwrap().get(&id), Some(&Value::Long(100)));
        assert!(entity.update(1, &[(id, Value::Null)]).is_err());
        assert!(entity.read(0, &[name]).is_err());
    }

    #[test]
    fn test_insert_validation() {
        let (_, entity, _, _) = create_test_entity();
        assert!(entity.insert(vec![Value::Long(1)]).is_err());
        assert!(entity.insert(vec![Value::Int(1), Value::Null]).is_err());
        assert!(entity.insert(vec![Value::Long(1), Value::Null]).is_ok());
    }

    #[test]
    fn test_index_filter() {
        let (_, entity, id, _) = create_test_entity();
        let index = entity.create_index("t_id", &id, IndexType::Hash).unwrap();
        let mut bindings = BindingContext::new();
        let value = bindings.bind_value(Value::Long(3)).unwrap();
        let predicate = BooleanPredicate::atomic(ComparisonOperator::Equal, id.clone(), vec![value]).unwrap();

        assert!(index.can_process(&predicate));
        assert_eq!(index.count(&predicate), 2);
        let ids: Vec<TupleId> = index
            .filter(&predicate, &bindings)
            .unwrap()
            .map(|t| t.unwrap().tuple_id)
            .collect();
        assert_eq!(ids, vec![3, 8]);
        assert!(!index.can_process(&predicate.clone().negate()));
        assert!(index.filter_range(&predicate, &bindings, PartitionRange::new(0, 2)).is_err());
    }

    #[test]
    fn test_full_text_index() {
        let (_, entity, _, name) = create_test_entity();
        let index = entity.create_index("t_name", &name, IndexType::Fulltext).unwrap();
        let mut bindings = BindingContext::new();
        let query = bindings.bind_value(Value::from("NUMBER 7")).unwrap();
        let predicate = BooleanPredicate::atomic(ComparisonOperator::Match, name, vec![query]).unwrap();
        let ids: Vec<TupleId> = index
            .filter(&predicate, &bindings)
            .unwrap()
            .map(|t| t.unwrap().tuple_id)
            .collect();
        assert_eq!(ids, vec![7]);
    }

    #[test]
    fn test_vector_index_ranks_neighbours() {
        use crate::function::{FunctionCall, FunctionKind};
        let catalogue = MemoryCatalogue::default();
        let vector = ColumnDescriptor::qualified("v", "vector", Type::FloatVector(2), false);
        let entity = catalogue.create_entity("v", vec![vector.clone()]).unwrap();
        for x in [5.0, 1.0, 3.0, 1.0] {
            entity.insert(vec![Value::FloatVector(vec![x, 0.0])]).unwrap();
        }
        let index = entity.create_index("v_vector", &vector, IndexType::Vector).unwrap();

        let mut bindings = BindingContext::new();
        let query = bindings.bind_value(Value::FloatVector(vec![0.0, 0.0])).unwrap();
        let distance = ColumnDescriptor::new("distance", Type::Double, false);
        let call = FunctionCall::new(
            FunctionKind::EuclideanDistance,
            vec![Binding::Column(vector.clone()), query],
            distance.clone(),
        )
        .unwrap();

        let nearest = ProximityPredicate::new(call.clone(), 3, SortOrder::Ascending).unwrap();
        assert!(index.can_process_nearest(&nearest));
        assert_eq!(index.nearest_columns(&nearest), vec![distance.clone(), vector]);
        let tuples: Vec<Tuple> = index.nearest(&nearest, &bindings).unwrap().collect::<Result<_>>().unwrap();
        let ids: Vec<TupleId> = tuples.iter().map(|t| t.tuple_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert_eq!(tuples[2].get(&distance), Some(&Value::Double(3.0)));

        let farthest = ProximityPredicate::new(call, 1, SortOrder::Descending).unwrap();
        let ids: Vec<TupleId> = index
            .nearest(&farthest, &bindings)
            .unwrap()
            .map(|t| t.unwrap().tuple_id)
            .collect();
        assert_eq!(ids, vec![0]);

        let (_, other, id, _) = create_test_entity();
        let btree = other.create_index("t_id", &id, IndexType::BTree).unwrap();
        assert!(!btree.can_process_nearest(&nearest));
        assert!(btree.nearest(&nearest, &bindings).is_err());
    }

    #[test]
    fn test_transaction_handles() {
        let transaction = MemoryTransaction::new(7, 2);
        let handle = transaction.get_tx("t").unwrap();
        assert_eq!(handle.tx_id(), 7);
        assert_eq!(transaction.active_handles(), 1);
        drop(handle);
        assert_eq!(transaction.active_handles(), 0);
    }

    #[test]
    fn test_unknown_entity() {
        let catalogue = MemoryCatalogue::default();
        assert!(matches!(catalogue.entity("nope"), Err(QueryError::UnknownEntity(_))));
    }
}
