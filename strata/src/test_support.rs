/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Fixtures shared by the unit tests.

use crate::binding::{Binding, BindingContext};
use crate::catalogue::memory::{MemoryCatalogue, MemoryEntity, MemoryTransaction};
use crate::catalogue::Entity;
use crate::context::QueryContext;
use crate::function::{FunctionCall, FunctionKind};
use crate::hints::QueryHint;
use crate::planner::{LogicalNode, PhysicalNode};
use crate::predicate::{BooleanPredicate, ComparisonOperator};
use crate::GroupId;
use shared::{ColumnDescriptor, Type, Value};
use std::sync::Arc;

pub(crate) const ENTITY: &str = "warren.features";
pub(crate) const OTHER: &str = "warren.other";

pub(crate) struct Fixture {
    pub catalogue: Arc<MemoryCatalogue>,
    pub entity: Arc<MemoryEntity>,
    pub other: Arc<MemoryEntity>,
}

impl Fixture {
    /// Creates `warren.features(id, name, feature)` with `rows` rows and an
    /// empty `warren.other(id)`.
    pub fn new(rows: i64) -> Self {
        let catalogue = Arc::new(MemoryCatalogue::default());
        let entity = catalogue
            .create_entity(
                ENTITY,
                vec![
                    ColumnDescriptor::qualified(ENTITY, "id", Type::Long, false),
                    ColumnDescriptor::qualified(ENTITY, "name", Type::String, false),
                    ColumnDescriptor::qualified(ENTITY, "feature", Type::FloatVector(4), false),
                ],
            )
            .unwrap();
        for i in 0..rows {
            entity
                .insert(vec![
                    Value::Long(i),
                    Value::String(format!("name {}", i)),
                    Value::FloatVector(vec![i as f32, 0.0, 0.0, 0.0]),
                ])
                .unwrap();
        }
        let other = catalogue
            .create_entity(OTHER, vec![ColumnDescriptor::qualified(OTHER, "id", Type::Long, false)])
            .unwrap();
        Fixture {
            catalogue,
            entity,
            other,
        }
    }

    pub fn id(&self) -> ColumnDescriptor {
        ColumnDescriptor::qualified(ENTITY, "id", Type::Long, false)
    }

    pub fn name(&self) -> ColumnDescriptor {
        ColumnDescriptor::qualified(ENTITY, "name", Type::String, false)
    }

    pub fn feature(&self) -> ColumnDescriptor {
        ColumnDescriptor::qualified(ENTITY, "feature", Type::FloatVector(4), false)
    }

    pub fn other_id(&self) -> ColumnDescriptor {
        ColumnDescriptor::qualified(OTHER, "id", Type::Long, false)
    }

    pub fn entity(&self) -> Arc<dyn Entity> {
        self.entity.clone()
    }

    pub fn other_entity(&self) -> Arc<dyn Entity> {
        self.other.clone()
    }

    pub fn logical_scan(&self, group_id: GroupId, columns: &[ColumnDescriptor]) -> Arc<LogicalNode> {
        LogicalNode::entity_scan(group_id, self.entity(), columns.to_vec()).unwrap()
    }

    pub fn physical_scan(&self, group_id: GroupId, columns: &[ColumnDescriptor]) -> Arc<PhysicalNode> {
        PhysicalNode::entity_scan(group_id, self.entity(), columns.to_vec()).unwrap()
    }

    /// `id = :0`, with the literal bound in a throw-away binding context.
    pub fn id_equals(&self, value: i64) -> BooleanPredicate {
        let mut bindings = BindingContext::new();
        let binding = bindings.bind_value(Value::Long(value)).unwrap();
        BooleanPredicate::atomic(ComparisonOperator::Equal, self.id(), vec![binding]).unwrap()
    }

    /// Euclidean distance between `feature` and a constant query vector.
    pub fn distance(&self) -> FunctionCall {
        let mut bindings = BindingContext::new();
        let query = bindings
            .bind_value(Value::FloatVector(vec![0.0, 0.0, 0.0, 0.0]))
            .unwrap();
        FunctionCall::new(
            FunctionKind::EuclideanDistance,
            vec![Binding::Column(self.feature()), query],
            self.distance_column(),
        )
        .unwrap()
    }

    pub fn distance_column(&self) -> ColumnDescriptor {
        ColumnDescriptor::new("distance", Type::Double, false)
    }

    pub fn name_matches(&self, query: &str) -> BooleanPredicate {
        let mut bindings = BindingContext::new();
        let binding = bindings.bind_value(Value::from(query)).unwrap();
        BooleanPredicate::atomic(ComparisonOperator::Match, self.name(), vec![binding]).unwrap()
    }

    pub fn id_in_subquery(&self, group_id: GroupId) -> BooleanPredicate {
        BooleanPredicate::atomic(
            ComparisonOperator::In,
            self.id(),
            vec![Binding::Subquery {
                group_id,
                column: self.other_id(),
            }],
        )
        .unwrap()
    }

    pub fn context(&self, workers: usize, hints: Vec<QueryHint>) -> QueryContext {
        QueryContext::new(
            "test",
            self.catalogue.clone(),
            Arc::new(MemoryTransaction::new(1, workers)),
            hints,
        )
    }
}
