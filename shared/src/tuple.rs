/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::column::ColumnDescriptor;
use crate::value::Value;
use std::sync::Arc;

/// Identifier of a row within an entity.
pub type TupleId = i64;

/// A row flowing through the execution pipeline. The column layout is shared
/// between all tuples produced by the same operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub tuple_id: TupleId,
    columns: Arc<[ColumnDescriptor]>,
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(tuple_id: TupleId, columns: Arc<[ColumnDescriptor]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len(), "tuple layout mismatch");
        Tuple {
            tuple_id,
            columns,
            values,
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn layout(&self) -> &Arc<[ColumnDescriptor]> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, column: &ColumnDescriptor) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of the given column, if part of this tuple.
    pub fn get(&self, column: &ColumnDescriptor) -> Option<&Value> {
        self.index_of(column).map(|i| &self.values[i])
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|i| &self.values[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_lookup() {
        let columns: Arc<[ColumnDescriptor]> = vec![
            ColumnDescriptor::new("t.a", Type::Int, false),
            ColumnDescriptor::new("t.b", Type::String, true),
        ]
        .into();
        let tuple = Tuple::new(7, columns.clone(), vec![Value::Int(1), Value::Null]);
        assert_eq!(tuple.get(&columns[0]), Some(&Value::Int(1)));
        assert_eq!(tuple.get_by_name("t.b"), Some(&Value::Null));
        assert_eq!(tuple.get_by_name("t.c"), None);
        assert_eq!(tuple.tuple_id, 7);
    }
}
