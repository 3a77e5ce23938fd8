/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::operator::Operator;
use super::{CancellationToken, QueryMetadata};
use crate::binding::BindingContext;
use crate::catalogue::Transaction;
use crate::config::ExecutionConfig;
use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::planner::operators::{PhysicalKind, PhysicalNode, PlanNode, Projection};
use crate::predicate::PatternCache;
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, error, trace};
use rayon::prelude::*;
use shared::{ColumnDescriptor, SortOrder, Tuple, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Runs operator trees as pipelines of threads connected by bounded channels.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    channel_capacity: usize,
}

impl ExecutionEngine {
    pub fn new(config: &ExecutionConfig) -> Self {
        ExecutionEngine {
            channel_capacity: config.channel_capacity.max(1),
        }
    }

    /// Starts executing `operator` and returns the stream of its results.
    pub fn execute(&self, operator: Operator, ctx: &QueryContext) -> Result<ResultStream> {
        let started = Instant::now();
        let token = CancellationToken::new();
        let columns = operator.node.columns().to_vec();
        let (sender, receiver) = bounded(self.channel_capacity);
        let mut threads = Vec::new();
        let spawned = self.spawn(operator, sender, ctx.txn(), &token, &mut threads);

        let stream = ResultStream {
            receiver: Some(receiver),
            threads,
            token,
            columns,
            metadata: QueryMetadata {
                transaction_id: ctx.txn().tx_id(),
                query_id: ctx.query_id().to_string(),
                planning_duration: ctx.planning_duration(),
                execution_duration: Default::default(),
            },
            started,
            finished: false,
        };
        // Dropping the stream stops and joins whatever was started already.
        spawned.map(|_| stream)
    }

    fn spawn(
        &self,
        operator: Operator,
        output: Sender<Tuple>,
        txn: &Arc<dyn Transaction>,
        token: &CancellationToken,
        threads: &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        let Operator {
            node,
            inputs,
            bindings,
        } = operator;

        // The partitions of a merge write into the merge's output directly.
        if let PhysicalKind::Merge = node.kind() {
            for input in inputs {
                self.spawn(input, output.clone(), txn, token, threads)?;
            }
            return Ok(());
        }

        let mut receivers = Vec::with_capacity(inputs.len());
        for input in inputs {
            let (sender, receiver) = bounded(self.channel_capacity);
            self.spawn(input, sender, txn, token, threads)?;
            receivers.push(Input {
                receiver,
                token: token.clone(),
            });
        }

        let task = Task {
            node: node.clone(),
            inputs: receivers,
            bindings,
            txn: txn.clone(),
            sink: Sink {
                output,
                token: token.clone(),
            },
        };
        let token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("strata-{}-{}", node.name().to_lowercase(), node.group_id()))
            .spawn(move || {
                let mut task = task;
                match task.run() {
                    Ok(()) | Err(QueryError::Cancelled) => trace!("{} finished", node.name()),
                    Err(e) => {
                        error!("{} (group {}) failed: {}", node.name(), node.group_id(), e);
                        token.fail(e);
                    }
                }
                // Channels close only after the failure has been recorded.
                drop(task);
            })
            .map_err(|e| QueryError::internal(format!("failed to start operator thread: {}", e)))?;
        threads.push(handle);
        Ok(())
    }
}

/// Receiving end of an operator input. Ends with [`QueryError::Cancelled`]
/// rather than silently if the pipeline was cancelled.
struct Input {
    receiver: Receiver<Tuple>,
    token: CancellationToken,
}

impl Iterator for Input {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.token.is_cancelled() {
            return Some(Err(QueryError::Cancelled));
        }
        match self.receiver.recv() {
            Ok(tuple) => Some(Ok(tuple)),
            Err(_) if self.token.is_cancelled() => Some(Err(QueryError::Cancelled)),
            Err(_) => None,
        }
    }
}

struct Sink {
    output: Sender<Tuple>,
    token: CancellationToken,
}

impl Sink {
    /// Hands a tuple to the parent. Fails once nobody is listening anymore.
    fn emit(&self, tuple: Tuple) -> Result<()> {
        self.token.check()?;
        self.output.send(tuple).map_err(|_| QueryError::Cancelled)
    }
}

/// One operator, ready to run on its own thread.
struct Task {
    node: Arc<PhysicalNode>,
    inputs: Vec<Input>,
    bindings: BindingContext,
    txn: Arc<dyn Transaction>,
    sink: Sink,
}

impl Task {
    fn layout(&self) -> Arc<[ColumnDescriptor]> {
        self.node.columns().to_vec().into()
    }

    fn input(&mut self, index: usize) -> Result<Input> {
        if index >= self.inputs.len() {
            return Err(QueryError::internal(format!(
                "{} has no input {}",
                self.node.name(),
                index
            )));
        }
        Ok(self.inputs.remove(index))
    }

    fn run(&mut self) -> Result<()> {
        let node = self.node.clone();
        let layout = self.layout();
        match node.kind() {
            PhysicalKind::EntityScan {
                entity,
                fetch,
                partition,
            } => {
                let _tx = self.txn.get_tx(entity.name())?;
                for tuple in entity.scan(fetch, *partition)? {
                    self.sink.emit(tuple?)?;
                }
                Ok(())
            }
            PhysicalKind::IndexScan {
                index,
                predicate,
                fetch,
                partition,
            } => {
                let _tx = self.txn.get_tx(index.name())?;
                for tuple in index.filter_range(predicate, &self.bindings, *partition)? {
                    let tuple = tuple?;
                    let values = fetch
                        .iter()
                        .map(|c| tuple.get(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    self.sink.emit(Tuple::new(tuple.tuple_id, layout.clone(), values))?;
                }
                Ok(())
            }
            PhysicalKind::NearestNeighbourScan {
                index,
                predicate,
                fetch,
            } => {
                let _tx = self.txn.get_tx(index.name())?;
                for tuple in index.nearest(predicate, &self.bindings)? {
                    let tuple = tuple?;
                    let values = fetch
                        .iter()
                        .map(|c| tuple.get(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    self.sink.emit(Tuple::new(tuple.tuple_id, layout.clone(), values))?;
                }
                Ok(())
            }
            PhysicalKind::Filter { predicate } => {
                let mut patterns = PatternCache::new();
                for tuple in self.input(0)? {
                    let tuple = tuple?;
                    if predicate.is_match(&tuple, &self.bindings, &mut patterns)? {
                        self.sink.emit(tuple)?;
                    }
                }
                Ok(())
            }
            PhysicalKind::Fetch { entity, fetch } => {
                let _tx = self.txn.get_tx(entity.name())?;
                for tuple in self.input(0)? {
                    let tuple = tuple?;
                    let tuple_id = tuple.tuple_id;
                    let fetched = entity.read(tuple_id, fetch)?;
                    let mut values = tuple.into_values();
                    values.extend(fetched.into_values());
                    self.sink.emit(Tuple::new(tuple_id, layout.clone(), values))?;
                }
                Ok(())
            }
            PhysicalKind::Function { call } => {
                for tuple in self.input(0)? {
                    let tuple = tuple?;
                    let result = call.evaluate(&tuple, &self.bindings)?;
                    let tuple_id = tuple.tuple_id;
                    let mut values = tuple.into_values();
                    values.push(result);
                    self.sink.emit(Tuple::new(tuple_id, layout.clone(), values))?;
                }
                Ok(())
            }
            PhysicalKind::Sort { order } => {
                let mut tuples = self.input(0)?.collect::<Result<Vec<_>>>()?;
                tuples.par_sort_by(|a, b| compare(a, b, order));
                for tuple in tuples {
                    self.sink.emit(tuple)?;
                }
                Ok(())
            }
            PhysicalKind::LimitingSort { order, limit, skip } => {
                let keep = to_count(limit.saturating_add(*skip));
                let mut tuples = Vec::new();
                for tuple in self.input(0)? {
                    tuples.push(tuple?);
                    if tuples.len() >= keep.saturating_mul(2).max(1024) {
                        tuples.par_sort_by(|a, b| compare(a, b, order));
                        tuples.truncate(keep);
                    }
                }
                tuples.par_sort_by(|a, b| compare(a, b, order));
                for tuple in tuples.into_iter().skip(to_count(*skip)).take(to_count(*limit)) {
                    self.sink.emit(tuple)?;
                }
                Ok(())
            }
            PhysicalKind::Limit { limit, skip } => {
                let input = self.input(0)?;
                for tuple in input.skip(to_count(*skip)).take(to_count(*limit)) {
                    self.sink.emit(tuple?)?;
                }
                Ok(())
            }
            PhysicalKind::Projection(Projection::Select(columns)) => {
                for tuple in self.input(0)? {
                    let tuple = tuple?;
                    let values = columns
                        .iter()
                        .map(|c| tuple.get(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    self.sink.emit(Tuple::new(tuple.tuple_id, layout.clone(), values))?;
                }
                Ok(())
            }
            PhysicalKind::Projection(Projection::Count) => {
                let mut count = 0i64;
                for tuple in self.input(0)? {
                    tuple?;
                    count += 1;
                }
                self.sink.emit(Tuple::new(0, layout, vec![Value::Long(count)]))
            }
            PhysicalKind::Delete { entity } => {
                let _tx = self.txn.get_tx(entity.name())?;
                let mut deleted = 0i64;
                for tuple in self.input(0)? {
                    entity.delete(tuple?.tuple_id)?;
                    deleted += 1;
                }
                debug!("deleted {} tuple(s) from {}", deleted, entity.name());
                self.sink.emit(Tuple::new(0, layout, vec![Value::Long(deleted)]))
            }
            PhysicalKind::Update { entity, values } => {
                let _tx = self.txn.get_tx(entity.name())?;
                let mut updated = 0i64;
                for tuple in self.input(0)? {
                    let tuple = tuple?;
                    let resolved = values
                        .iter()
                        .map(|(c, b)| Ok((c.clone(), self.bindings.resolve(b, &tuple)?.clone())))
                        .collect::<Result<Vec<_>>>()?;
                    entity.update(tuple.tuple_id, &resolved)?;
                    updated += 1;
                }
                debug!("updated {} tuple(s) in {}", updated, entity.name());
                self.sink.emit(Tuple::new(0, layout, vec![Value::Long(updated)]))
            }
            PhysicalKind::FilterOnSubSelect { predicate } => {
                let right = self.input(1)?;
                let left = self.input(0)?;
                let group_id = node.inputs()[1].group_id();
                let column = predicate.subquery_column(group_id).cloned();
                let mut values = Vec::new();
                for tuple in right {
                    let tuple = tuple?;
                    let value = match &column {
                        Some(column) => tuple.get(column).cloned(),
                        None => tuple.values().first().cloned(),
                    };
                    values.push(value.unwrap_or(Value::Null));
                }
                trace!("sub-query {} produced {} value(s)", group_id, values.len());
                self.bindings.bind_subquery(group_id, values);

                let mut patterns = PatternCache::new();
                for tuple in left {
                    let tuple = tuple?;
                    if predicate.is_match(&tuple, &self.bindings, &mut patterns)? {
                        self.sink.emit(tuple)?;
                    }
                }
                Ok(())
            }
            PhysicalKind::Merge => Err(QueryError::internal("Merge is not run as an operator")),
        }
    }
}

/// Clamps a limit or skip into a tuple count. Negative counts become zero.
fn to_count(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

/// Orders two tuples by the given columns. Incomparable values are equal.
fn compare(a: &Tuple, b: &Tuple, order: &[(ColumnDescriptor, SortOrder)]) -> Ordering {
    for (column, direction) in order {
        let ordering = match (a.get(column), b.get(column)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        let ordering = match direction {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Results of a running query.
///
/// Dropping the stream, or calling [`ResultStream::close`], cancels the
/// pipeline and waits for all operators to stop, releasing their cursors
/// and transaction handles.
pub struct ResultStream {
    receiver: Option<Receiver<Tuple>>,
    threads: Vec<JoinHandle<()>>,
    token: CancellationToken,
    columns: Vec<ColumnDescriptor>,
    metadata: QueryMetadata,
    started: Instant,
    finished: bool,
}

impl ResultStream {
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Metadata of the query. The execution duration is final once the
    /// stream is exhausted or closed.
    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    pub fn close(mut self) -> QueryMetadata {
        self.shutdown();
        self.metadata.clone()
    }

    fn shutdown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.token.cancel();
        self.receiver.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("an operator of query {} panicked", self.metadata.query_id);
            }
        }
        self.metadata.execution_duration = self.started.elapsed();
    }
}

impl Iterator for ResultStream {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.receiver.as_ref()?.recv();
        match next {
            Ok(tuple) => Some(Ok(tuple)),
            Err(_) => {
                let failure = self.token.error();
                self.shutdown();
                failure.map(Err)
            }
        }
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    fn run(ctx: &QueryContext, plan: &Arc<PhysicalNode>) -> Vec<Tuple> {
        let engine = ExecutionEngine::new(&ExecutionConfig::default());
        let operator = Operator::build(plan, ctx).unwrap();
        engine
            .execute(operator, ctx)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_filter_and_fetch() {
        let fixture = Fixture::new(100);
        let mut ctx = fixture.context(1, vec![]);
        ctx.bindings_mut().bind_value(Value::Long(42)).unwrap();
        let scan = fixture.physical_scan(0, &[fixture.id()]);
        let filter = PhysicalNode::filter(scan, fixture.id_equals(42)).unwrap();
        let fetch = PhysicalNode::fetch(filter, fixture.entity(), vec![fixture.name()]).unwrap();

        let tuples = run(&ctx, &fetch);
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].values(), &[Value::Long(42), Value::from("name 42")]);
        assert_eq!(fixture.entity.reads(), 1);
    }

    #[test]
    fn test_sort_limit_and_count() {
        let fixture = Fixture::new(50);
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.physical_scan(0, &[fixture.id()]);
        let order = vec![(fixture.id(), SortOrder::Descending)];
        let sorted = PhysicalNode::limiting_sort(scan.clone(), order, 3, 1).unwrap();
        let ids: Vec<Value> = run(&ctx, &sorted).into_iter().map(|t| t.values()[0].clone()).collect();
        assert_eq!(ids, vec![Value::Long(48), Value::Long(47), Value::Long(46)]);

        let count = PhysicalNode::count(PhysicalNode::limit(scan, 10, 45).unwrap()).unwrap();
        assert_eq!(run(&ctx, &count)[0].values(), &[Value::Long(5)]);
    }

    #[test]
    fn test_unbounded_limits_return_everything_after_skip() {
        let fixture = Fixture::new(20);
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.physical_scan(0, &[fixture.id()]);
        let order = vec![(fixture.id(), SortOrder::Ascending)];
        let sorted = PhysicalNode::limiting_sort(scan.clone(), order, i64::MAX, 1).unwrap();
        let tuples = run(&ctx, &sorted);
        assert_eq!(tuples.len(), 19);
        assert_eq!(tuples[0].values(), &[Value::Long(1)]);

        let limit = PhysicalNode::limit(scan.clone(), i64::MAX, 5).unwrap();
        assert_eq!(run(&ctx, &limit).len(), 15);
        let skipped = PhysicalNode::limit(scan, i64::MAX, i64::MAX).unwrap();
        assert!(run(&ctx, &skipped).is_empty());
    }

    #[test]
    fn test_function_appends_result() {
        let fixture = Fixture::new(5);
        let mut ctx = fixture.context(1, vec![]);
        ctx.bindings_mut()
            .bind_value(Value::FloatVector(vec![0.0, 0.0, 0.0, 0.0]))
            .unwrap();
        let scan = fixture.physical_scan(0, &[fixture.feature()]);
        let function = PhysicalNode::function(scan, fixture.distance()).unwrap();
        let order = vec![(fixture.distance_column(), SortOrder::Descending)];
        let sorted = PhysicalNode::sort(function, order).unwrap();
        let tuples = run(&ctx, &sorted);
        assert_eq!(tuples.len(), 5);
        assert_eq!(tuples[0].get(&fixture.distance_column()), Some(&Value::Double(4.0)));
    }

    #[test]
    fn test_delete_counts_tuples() {
        let fixture = Fixture::new(10);
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.physical_scan(0, &[fixture.id()]);
        let delete = PhysicalNode::delete(scan, fixture.entity()).unwrap();
        assert_eq!(run(&ctx, &delete)[0].values(), &[Value::Long(10)]);
        assert!(fixture.entity.rows().is_empty());
    }

    #[test]
    fn test_failure_is_reported() {
        let fixture = Fixture::new(10);
        let ctx = fixture.context(1, vec![]);
        let scan = fixture.physical_scan(0, &[fixture.id()]);
        let update = PhysicalNode::new(
            0,
            PhysicalKind::Update {
                entity: fixture.entity(),
                values: vec![(fixture.name(), crate::Binding::Column(fixture.id()))],
            },
            vec![scan],
        )
        .unwrap();

        let engine = ExecutionEngine::new(&ExecutionConfig::default());
        let operator = Operator::build(&update, &ctx).unwrap();
        let mut stream = engine.execute(operator, &ctx).unwrap();
        let error = stream.next().unwrap().unwrap_err();
        assert!(matches!(error, QueryError::TypeMismatch(_)));
        assert!(stream.next().is_none());
        assert_eq!(fixture.entity.open_cursors(), 0);
    }
}
