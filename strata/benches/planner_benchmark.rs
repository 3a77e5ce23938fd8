/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate criterion;
extern crate strata;

use criterion::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ColumnDescriptor, SortOrder, Type, Value};
use std::sync::Arc;
use strata::binding::Binding;
use strata::catalogue::memory::{MemoryCatalogue, MemoryEntity, MemoryTransaction};
use strata::config::{EngineConfig, ExecutionConfig, PlannerConfig};
use strata::function::{FunctionCall, FunctionKind};
use strata::planner::{LogicalNode, PlanCache, QueryPlanner};
use strata::{ExecutionEngine, QueryContext, QueryHint};

const ENTITY: &str = "bench.vectors";
const DIMENSION: usize = 32;

fn id() -> ColumnDescriptor {
    ColumnDescriptor::qualified(ENTITY, "id", Type::Long, false)
}

fn embedding() -> ColumnDescriptor {
    ColumnDescriptor::qualified(ENTITY, "embedding", Type::FloatVector(DIMENSION), false)
}

fn distance() -> ColumnDescriptor {
    ColumnDescriptor::new("distance", Type::Double, false)
}

fn random_vector(rng: &mut StdRng) -> Vec<f32> {
    (0..DIMENSION).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn setup_catalogue(rows: i64) -> (Arc<MemoryCatalogue>, Arc<MemoryEntity>) {
    let catalogue = Arc::new(MemoryCatalogue::new(EngineConfig::default()));
    let entity = catalogue.create_entity(ENTITY, vec![id(), embedding()]).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    for i in 0..rows {
        entity
            .insert(vec![Value::Long(i), Value::FloatVector(random_vector(&mut rng))])
            .unwrap();
    }
    (catalogue, entity)
}

// SELECT id, distance FROM vectors ORDER BY euclidean(embedding, ?) LIMIT 10
fn nearest_neighbours(
    catalogue: &Arc<MemoryCatalogue>,
    entity: &Arc<MemoryEntity>,
    hints: Vec<QueryHint>,
    query: Vec<f32>,
) -> QueryContext {
    let mut ctx = QueryContext::new("knn", catalogue.clone(), Arc::new(MemoryTransaction::new(1, 4)), hints);
    let query = ctx.bindings_mut().bind_value(Value::FloatVector(query)).unwrap();
    let call = FunctionCall::new(
        FunctionKind::EuclideanDistance,
        vec![Binding::Column(embedding()), query],
        distance(),
    )
    .unwrap();

    let scan = LogicalNode::entity_scan(0, entity.clone(), vec![id(), embedding()]).unwrap();
    let function = LogicalNode::function(scan, call).unwrap();
    let sort = LogicalNode::sort(function, vec![(distance(), SortOrder::Ascending)]).unwrap();
    let limit = LogicalNode::limit(sort, 10, 0).unwrap();
    let select = LogicalNode::select(limit, vec![id(), distance()]).unwrap();
    ctx.register(select).unwrap();
    ctx
}

fn planner_benchmark(c: &mut Criterion) {
    let (catalogue, entity) = setup_catalogue(20_000);
    let planner = QueryPlanner::with_default_rules(Arc::new(PlanCache::new(100)), &PlannerConfig::default());
    let engine = ExecutionEngine::new(&ExecutionConfig::default());
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("plan_knn_uncached", |b| {
        b.iter(|| {
            let ctx = nearest_neighbours(
                &catalogue,
                &entity,
                vec![QueryHint::BypassPlanCache, QueryHint::NoPlanCacheUpdate],
                random_vector(&mut rng),
            );
            ctx.plan(&planner).unwrap();
            black_box(ctx.physical().unwrap());
        })
    });

    c.bench_function("plan_knn_cached", |b| {
        b.iter(|| {
            let ctx = nearest_neighbours(&catalogue, &entity, vec![], random_vector(&mut rng));
            ctx.plan(&planner).unwrap();
            black_box(ctx.physical().unwrap());
        })
    });

    let mut group = c.benchmark_group("execute_knn");
    group.sample_size(20);
    for hints in [vec![QueryHint::NoParallel], vec![]] {
        let label = if hints.is_empty() { "default" } else { "serial" };
        group.bench_function(label, |b| {
            b.iter(|| {
                let ctx = nearest_neighbours(&catalogue, &entity, hints.clone(), random_vector(&mut rng));
                ctx.plan(&planner).unwrap();
                let results: Vec<_> = ctx.execute(&engine).unwrap().collect();
                black_box(results);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, planner_benchmark);
criterion_main!(benches);
