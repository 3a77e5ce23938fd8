/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::physical::{PhysicalKind, PhysicalNode};
use super::traits::{Trait, TraitKind, Traits};
use super::{append_columns, check_arity, check_columns, private, Arity, DigestBuilder, PlanNode};
use crate::binding::Binding;
use crate::catalogue::{Entity, PartitionRange};
use crate::error::{QueryError, Result};
use crate::function::FunctionCall;
use crate::predicate::BooleanPredicate;
use crate::{Digest, GroupId};
use shared::{ColumnDescriptor, SortOrder, Type};
use std::fmt;
use std::sync::Arc;

/// Output of a projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Select(Vec<ColumnDescriptor>),
    Count,
}

impl Projection {
    pub fn count_column() -> ColumnDescriptor {
        ColumnDescriptor::new("count", Type::Long, false)
    }
}

/// Column produced by DELETE.
pub fn deleted_column() -> ColumnDescriptor {
    ColumnDescriptor::new("deleted", Type::Long, false)
}

/// Column produced by UPDATE.
pub fn updated_column() -> ColumnDescriptor {
    ColumnDescriptor::new("updated", Type::Long, false)
}

#[derive(Debug, Clone)]
pub enum LogicalKind {
    EntityScan {
        entity: Arc<dyn Entity>,
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
    /// Filters the left input with a predicate over the right input's output.
    FilterOnSubSelect {
        predicate: BooleanPredicate,
    },
}

impl LogicalKind {
    pub fn name(&self) -> &'static str {
        match self {
            LogicalKind::EntityScan { .. } => "EntityScan",
            LogicalKind::Filter { .. } => "Filter",
            LogicalKind::Fetch { .. } => "Fetch",
            LogicalKind::Function { .. } => "Function",
            LogicalKind::Sort { .. } => "Sort",
            LogicalKind::Limit { .. } => "Limit",
            LogicalKind::Projection(Projection::Select(_)) => "Select",
            LogicalKind::Projection(Projection::Count) => "Count",
            LogicalKind::Delete { .. } => "Delete",
            LogicalKind::Update { .. } => "Update",
            LogicalKind::FilterOnSubSelect { .. } => "FilterOnSubSelect",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            LogicalKind::EntityScan { .. } => Arity::Nullary,
            LogicalKind::FilterOnSubSelect { .. } => Arity::Binary,
            _ => Arity::Unary,
        }
    }

    fn hash_into(&self, digest: &mut DigestBuilder) {
        match self {
            LogicalKind::EntityScan { entity, fetch } | LogicalKind::Fetch { entity, fetch } => {
                digest.write(entity.name()).write(fetch);
            }
            LogicalKind::Filter { predicate } | LogicalKind::FilterOnSubSelect { predicate } => {
                digest.write(predicate);
            }
            LogicalKind::Function { call } => {
                digest.write(call);
            }
            LogicalKind::Sort { order } => {
                digest.write(order);
            }
            LogicalKind::Limit { limit, skip } => {
                digest.write(limit).write(skip);
            }
            LogicalKind::Projection(projection) => {
                digest.write(projection);
            }
            LogicalKind::Delete { entity } => {
                digest.write(entity.name());
            }
            LogicalKind::Update { entity, values } => {
                digest.write(entity.name()).write(values);
            }
        }
    }
}

#[derive(Debug)]
pub struct LogicalNode {
    group_id: GroupId,
    kind: LogicalKind,
    inputs: Vec<Arc<LogicalNode>>,
    columns: Vec<ColumnDescriptor>,
    traits: Traits,
    digest: Digest,
}

impl private::Sealed for LogicalNode {}

impl LogicalNode {
    fn build(group_id: GroupId, kind: LogicalKind, inputs: Vec<Arc<LogicalNode>>) -> Result<Arc<Self>> {
        let name = kind.name();
        check_arity(name, kind.arity(), inputs.len())?;
        let group_id = inputs.first().map(|i| i.group_id).unwrap_or(group_id);
        let (columns, traits) = derive(&kind, &inputs)?;

        let mut digest = DigestBuilder::new(name, group_id);
        kind.hash_into(&mut digest);
        let digest = digest.finish(&columns, &traits, &inputs);

        Ok(Arc::new(LogicalNode {
            group_id,
            kind,
            inputs,
            columns,
            traits,
            digest,
        }))
    }

    pub fn entity_scan(
        group_id: GroupId,
        entity: Arc<dyn Entity>,
        fetch: Vec<ColumnDescriptor>,
    ) -> Result<Arc<Self>> {
        Self::build(group_id, LogicalKind::EntityScan { entity, fetch }, vec![])
    }

    pub fn filter(input: Arc<Self>, predicate: BooleanPredicate) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Filter { predicate }, vec![input])
    }

    pub fn fetch(input: Arc<Self>, entity: Arc<dyn Entity>, fetch: Vec<ColumnDescriptor>) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Fetch { entity, fetch }, vec![input])
    }

    pub fn function(input: Arc<Self>, call: FunctionCall) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Function { call }, vec![input])
    }

    pub fn sort(input: Arc<Self>, order: Vec<(ColumnDescriptor, SortOrder)>) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Sort { order }, vec![input])
    }

    pub fn limit(input: Arc<Self>, limit: i64, skip: i64) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Limit { limit, skip }, vec![input])
    }

    pub fn select(input: Arc<Self>, columns: Vec<ColumnDescriptor>) -> Result<Arc<Self>> {
        Self::build(
            input.group_id,
            LogicalKind::Projection(Projection::Select(columns)),
            vec![input],
        )
    }

    pub fn count(input: Arc<Self>) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Projection(Projection::Count), vec![input])
    }

    pub fn delete(input: Arc<Self>, entity: Arc<dyn Entity>) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Delete { entity }, vec![input])
    }

    pub fn update(
        input: Arc<Self>,
        entity: Arc<dyn Entity>,
        values: Vec<(ColumnDescriptor, Binding)>,
    ) -> Result<Arc<Self>> {
        Self::build(input.group_id, LogicalKind::Update { entity, values }, vec![input])
    }

    pub fn filter_on_subselect(
        left: Arc<Self>,
        right: Arc<Self>,
        predicate: BooleanPredicate,
    ) -> Result<Arc<Self>> {
        Self::build(
            left.group_id,
            LogicalKind::FilterOnSubSelect { predicate },
            vec![left, right],
        )
    }

    pub fn kind(&self) -> &LogicalKind {
        &self.kind
    }

    /// Translates this tree 1:1 into a physical tree.
    pub fn implement(&self) -> Result<Arc<PhysicalNode>> {
        let inputs = self
            .inputs
            .iter()
            .map(|i| i.implement())
            .collect::<Result<Vec<_>>>()?;
        let kind = match &self.kind {
            LogicalKind::EntityScan { entity, fetch } => PhysicalKind::EntityScan {
                entity: entity.clone(),
                fetch: fetch.clone(),
                partition: PartitionRange::FULL,
            },
            LogicalKind::Filter { predicate } => PhysicalKind::Filter {
                predicate: predicate.clone(),
            },
            LogicalKind::Fetch { entity, fetch } => PhysicalKind::Fetch {
                entity: entity.clone(),
                fetch: fetch.clone(),
            },
            LogicalKind::Function { call } => PhysicalKind::Function { call: call.clone() },
            LogicalKind::Sort { order } => PhysicalKind::Sort {
                order: order.clone(),
            },
            LogicalKind::Limit { limit, skip } => PhysicalKind::Limit {
                limit: *limit,
                skip: *skip,
            },
            LogicalKind::Projection(projection) => PhysicalKind::Projection(projection.clone()),
            LogicalKind::Delete { entity } => PhysicalKind::Delete {
                entity: entity.clone(),
            },
            LogicalKind::Update { entity, values } => PhysicalKind::Update {
                entity: entity.clone(),
                values: values.clone(),
            },
            LogicalKind::FilterOnSubSelect { predicate } => PhysicalKind::FilterOnSubSelect {
                predicate: predicate.clone(),
            },
        };
        PhysicalNode::new(self.group_id, kind, inputs)
    }
}

/// Derives and validates the output columns and traits of a logical node.
fn derive(kind: &LogicalKind, inputs: &[Arc<LogicalNode>]) -> Result<(Vec<ColumnDescriptor>, Traits)> {
    let name = kind.name();
    let input = inputs.first();
    let input_columns = input.map(|i| i.columns.as_slice()).unwrap_or(&[]);
    let inherited = input.map(|i| i.traits.inherited()).unwrap_or_default();

    let (columns, traits) = match kind {
        LogicalKind::EntityScan { entity, fetch } => {
            check_columns(name, entity.columns(), fetch)?;
            (append_columns(name, &[], fetch)?, Traits::new())
        }
        LogicalKind::Filter { predicate } => {
            check_columns(name, input_columns, &predicate.columns())?;
            if !predicate.subqueries().is_empty() {
                return Err(QueryError::invalid_query(
                    "predicates over sub-queries require FilterOnSubSelect",
                ));
            }
            (input_columns.to_vec(), inherited)
        }
        LogicalKind::Fetch { entity, fetch } => {
            if fetch.is_empty() {
                return Err(QueryError::invalid_query("Fetch requires at least one column"));
            }
            check_columns(name, entity.columns(), fetch)?;
            (append_columns(name, input_columns, fetch)?, inherited)
        }
        LogicalKind::Function { call } => {
            check_columns(name, input_columns, &call.columns())?;
            (
                append_columns(name, input_columns, std::slice::from_ref(&call.out))?,
                inherited,
            )
        }
        LogicalKind::Sort { order } => {
            let order_columns: Vec<_> = order.iter().map(|(c, _)| c.clone()).collect();
            check_columns(name, input_columns, &order_columns)?;
            (input_columns.to_vec(), inherited.with(Trait::Order(order.clone())))
        }
        LogicalKind::Limit { limit, skip } => {
            if *limit < 0 || *skip < 0 {
                return Err(QueryError::invalid_query("LIMIT and SKIP must not be negative"));
            }
            (input_columns.to_vec(), inherited.with(Trait::Limit { limit: *limit }))
        }
        LogicalKind::Projection(Projection::Select(columns)) => {
            check_columns(name, input_columns, columns)?;
            (append_columns(name, &[], columns)?, retain_order(inherited, columns))
        }
        LogicalKind::Projection(Projection::Count) => (
            vec![Projection::count_column()],
            Traits::new().with(Trait::NotPartitionable),
        ),
        LogicalKind::Delete { .. } => (
            vec![deleted_column()],
            Traits::new().with(Trait::NotPartitionable),
        ),
        LogicalKind::Update { entity, values } => {
            let targets: Vec<_> = values.iter().map(|(c, _)| c.clone()).collect();
            check_columns(name, entity.columns(), &targets)?;
            let read: Vec<_> = values.iter().filter_map(|(_, b)| b.column().cloned()).collect();
            check_columns(name, input_columns, &read)?;
            (
                vec![updated_column()],
                Traits::new().with(Trait::NotPartitionable),
            )
        }
        LogicalKind::FilterOnSubSelect { predicate } => {
            check_subselect(inputs, predicate)?;
            (input_columns.to_vec(), inherited)
        }
    };
    Ok((columns, traits))
}

pub(crate) fn check_subselect<N: PlanNode>(inputs: &[Arc<N>], predicate: &BooleanPredicate) -> Result<()> {
    let (left, right) = (&inputs[0], &inputs[1]);
    if left.group_id() == right.group_id() {
        return Err(QueryError::invalid_query(
            "the sub-query of FilterOnSubSelect must have its own group",
        ));
    }
    if !predicate.subqueries().contains(&right.group_id()) {
        return Err(QueryError::invalid_query(format!(
            "predicate does not reference sub-query group {}",
            right.group_id()
        )));
    }
    check_columns("FilterOnSubSelect", left.columns(), &predicate.columns())
}

/// Drops the order trait if a projection removes one of the sort columns.
pub(crate) fn retain_order(mut traits: Traits, columns: &[ColumnDescriptor]) -> Traits {
    let dropped = traits
        .order()
        .map(|order| order.iter().any(|(c, _)| !columns.contains(c)))
        .unwrap_or(false);
    if dropped {
        traits.remove(TraitKind::Order);
    }
    traits
}

impl PlanNode for LogicalNode {
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
            LogicalKind::Filter { predicate } | LogicalKind::FilterOnSubSelect { predicate } => {
                predicate.columns()
            }
            LogicalKind::Function { call } => call.columns(),
            LogicalKind::Sort { order } => order.iter().map(|(c, _)| c.clone()).collect(),
            LogicalKind::Projection(Projection::Select(columns)) => columns.clone(),
            LogicalKind::Update { values, .. } => {
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
        Self::build(self.group_id, self.kind.clone(), inputs)
    }
}

impl fmt::Display for LogicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name(), self.group_id)?;
        if !self.inputs.is_empty() {
            let inputs: Vec<String> = self.inputs.iter().map(|i| i.to_string()).collect();
            write!(f, "({})", inputs.join(", "))?;
        }
        Ok(())
    }
}
