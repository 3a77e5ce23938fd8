/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Late binding of literals, columns and sub-query results.
//!
//! Plans refer to literal values only through a [`Binding`] slot, so two
//! queries that differ in their parameters share the same plan shape and
//! digest. The values live in a [`BindingContext`] owned by each query
//! context.

use crate::error::{QueryError, Result};
use crate::GroupId;
use rustc_hash::FxHashMap;
use shared::{ColumnDescriptor, Tuple, Type, Value};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// A literal stored in a slot of the binding context.
    Literal { slot: usize, logical_type: Type },
    /// A column of the tuple being processed.
    Column(ColumnDescriptor),
    /// The values produced by the sub-plan with the given group id.
    Subquery {
        group_id: GroupId,
        column: ColumnDescriptor,
    },
}

impl Binding {
    pub fn logical_type(&self) -> Type {
        match self {
            Binding::Literal { logical_type, .. } => *logical_type,
            Binding::Column(column) | Binding::Subquery { column, .. } => column.logical_type,
        }
    }

    /// The column read from the current tuple, if any.
    pub fn column(&self) -> Option<&ColumnDescriptor> {
        match self {
            Binding::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Binding::Literal { .. })
    }
}

/// Holds the current values of literal bindings and materialised sub-query
/// results.
#[derive(Debug, Clone, Default)]
pub struct BindingContext {
    literals: Vec<Value>,
    subqueries: FxHashMap<GroupId, Vec<Value>>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value of the given type to a fresh slot.
    pub fn bind(&mut self, value: Value, logical_type: Type) -> Result<Binding> {
        if !value.fits(logical_type) {
            return Err(QueryError::type_mismatch(format!(
                "cannot bind {} to a slot of type {}",
                value, logical_type
            )));
        }
        self.literals.push(value);
        Ok(Binding::Literal {
            slot: self.literals.len() - 1,
            logical_type,
        })
    }

    /// Binds a value, inferring the slot type from the value itself.
    pub fn bind_value(&mut self, value: Value) -> Result<Binding> {
        let logical_type = value
            .logical_type()
            .ok_or_else(|| QueryError::type_mismatch("cannot infer the type of NULL"))?;
        self.bind(value, logical_type)
    }

    /// Replaces the value of an existing literal binding.
    pub fn update(&mut self, binding: &Binding, value: Value) -> Result<()> {
        match binding {
            Binding::Literal { slot, logical_type } => {
                if !value.fits(*logical_type) {
                    return Err(QueryError::type_mismatch(format!(
                        "cannot bind {} to a slot of type {}",
                        value, logical_type
                    )));
                }
                let current = self.literals.get_mut(*slot).ok_or_else(|| {
                    QueryError::internal(format!("literal slot {} is not bound", slot))
                })?;
                *current = value;
                Ok(())
            }
            other => Err(QueryError::internal(format!(
                "{:?} is not a literal binding",
                other
            ))),
        }
    }

    pub fn literal(&self, slot: usize) -> Result<&Value> {
        self.literals
            .get(slot)
            .ok_or_else(|| QueryError::internal(format!("literal slot {} is not bound", slot)))
    }

    /// Stores the materialised output of a sub-plan.
    pub fn bind_subquery(&mut self, group_id: GroupId, values: Vec<Value>) {
        self.subqueries.insert(group_id, values);
    }

    pub fn subquery(&self, group_id: GroupId) -> Result<&[Value]> {
        self.subqueries
            .get(&group_id)
            .map(|v| v.as_slice())
            .ok_or(QueryError::UnknownGroup(group_id))
    }

    /// Resolves a binding to a single value. A sub-query yields its first value.
    pub fn resolve<'a>(&'a self, binding: &Binding, tuple: &'a Tuple) -> Result<&'a Value> {
        match binding {
            Binding::Literal { slot, .. } => self.literal(*slot),
            Binding::Column(column) => tuple.get(column).ok_or_else(|| {
                QueryError::internal(format!("column {} is not part of the tuple", column.name))
            }),
            Binding::Subquery { group_id, .. } => {
                Ok(self.subquery(*group_id)?.first().unwrap_or(&NULL))
            }
        }
    }

    /// Resolves a list of bindings, expanding sub-queries into all of their values.
    pub fn resolve_all<'a>(&'a self, bindings: &[Binding], tuple: &'a Tuple) -> Result<Vec<&'a Value>> {
        let mut values = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match binding {
                Binding::Subquery { group_id, .. } => {
                    values.extend(self.subquery(*group_id)?.iter());
                }
                other => values.push(self.resolve(other, tuple)?),
            }
        }
        Ok(values)
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}
