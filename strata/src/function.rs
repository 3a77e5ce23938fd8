/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Scalar functions evaluated per tuple, mostly vector distances.

use crate::binding::{Binding, BindingContext};
use crate::error::{QueryError, Result};
use crate::planner::cost::Cost;
use shared::{ColumnDescriptor, Tuple, Type, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    EuclideanDistance,
    ManhattanDistance,
    CosineDistance,
    InnerProduct,
}

impl FunctionKind {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::EuclideanDistance => "euclidean",
            FunctionKind::ManhattanDistance => "manhattan",
            FunctionKind::CosineDistance => "cosine",
            FunctionKind::InnerProduct => "inner_product",
        }
    }

    /// Floating point operations per vector component.
    fn flops_per_component(&self) -> f64 {
        match self {
            FunctionKind::EuclideanDistance => 3.0,
            FunctionKind::ManhattanDistance => 2.0,
            FunctionKind::CosineDistance => 6.0,
            FunctionKind::InnerProduct => 2.0,
        }
    }

    fn apply(&self, a: &[f32], b: &[f32]) -> f64 {
        let pairs = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64, *y as f64));
        match self {
            FunctionKind::EuclideanDistance => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            FunctionKind::ManhattanDistance => pairs.map(|(x, y)| (x - y).abs()).sum(),
            FunctionKind::InnerProduct => pairs.map(|(x, y)| x * y).sum(),
            FunctionKind::CosineDistance => {
                let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
                for (x, y) in pairs {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                let denominator = norm_a.sqrt() * norm_b.sqrt();
                if denominator == 0.0 {
                    1.0
                } else {
                    1.0 - dot / denominator
                }
            }
        }
    }
}

/// A function invocation whose result is appended to each tuple as `out`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCall {
    pub function: FunctionKind,
    pub arguments: Vec<Binding>,
    pub out: ColumnDescriptor,
}

impl FunctionCall {
    /// Validates that both arguments are vectors of the same dimension.
    pub fn new(function: FunctionKind, arguments: Vec<Binding>, out: ColumnDescriptor) -> Result<Self> {
        if arguments.len() != 2 {
            return Err(QueryError::invalid_query(format!(
                "{} expects 2 arguments but got {}",
                function.name(),
                arguments.len()
            )));
        }
        let (left, right) = (arguments[0].logical_type(), arguments[1].logical_type());
        if !left.is_vector() || left != right {
            return Err(QueryError::type_mismatch(format!(
                "{} cannot be applied to {} and {}",
                function.name(),
                left,
                right
            )));
        }
        if out.logical_type != Type::Double {
            return Err(QueryError::type_mismatch(format!(
                "{} produces DOUBLE, not {}",
                function.name(),
                out.logical_type
            )));
        }
        Ok(FunctionCall {
            function,
            arguments,
            out,
        })
    }

    /// Columns the arguments read from the input tuple.
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.arguments.iter().filter_map(Binding::column).cloned().collect()
    }

    pub fn dimension(&self) -> usize {
        self.arguments
            .first()
            .map(|a| a.logical_type().logical_size())
            .unwrap_or(0)
    }

    /// Cost of a single invocation.
    pub fn cost(&self) -> Cost {
        let dimension = self.dimension() as f64;
        Cost::FLOP * (self.function.flops_per_component() * dimension)
            + Cost::MEMORY_ACCESS * (2.0 * 4.0 * dimension)
    }

    pub fn evaluate(&self, tuple: &Tuple, bindings: &BindingContext) -> Result<Value> {
        let a = bindings.resolve(&self.arguments[0], tuple)?;
        let b = bindings.resolve(&self.arguments[1], tuple)?;
        match (a.as_vector(), b.as_vector()) {
            (Some(a), Some(b)) if a.len() == b.len() => {
                Ok(Value::Double(self.function.apply(a, b)))
            }
            _ if a.is_null() || b.is_null() => Ok(Value::Null),
            _ => Err(QueryError::type_mismatch(format!(
                "{} cannot be applied to {} and {}",
                self.function.name(),
                a,
                b
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn create_test_call(function: FunctionKind) -> (FunctionCall, Tuple, BindingContext) {
        let vector = ColumnDescriptor::new("t.v", Type::FloatVector(2), false);
        let mut bindings = BindingContext::new();
        let query = bindings.bind_value(Value::FloatVector(vec![0.0, 0.0])).unwrap();
        let call = FunctionCall::new(
            function,
            vec![Binding::Column(vector.clone()), query],
            ColumnDescriptor::new("distance", Type::Double, false),
        )
        .unwrap();
        let columns: Arc<[ColumnDescriptor]> = vec![vector].into();
        let tuple = Tuple::new(0, columns, vec![Value::FloatVector(vec![3.0, 4.0])]);
        (call, tuple, bindings)
    }

    #[test]
    fn test_distances() {
        let (call, tuple, bindings) = create_test_call(FunctionKind::EuclideanDistance);
        assert_eq!(call.evaluate(&tuple, &bindings).unwrap(), Value::Double(5.0));
        let (call, tuple, bindings) = create_test_call(FunctionKind::ManhattanDistance);
        assert_eq!(call.evaluate(&tuple, &bindings).unwrap(), Value::Double(7.0));
        let (call, tuple, bindings) = create_test_call(FunctionKind::CosineDistance);
        assert_eq!(call.evaluate(&tuple, &bindings).unwrap(), Value::Double(1.0));
    }

    #[test]
    fn test_validation() {
        let vector = ColumnDescriptor::new("t.v", Type::FloatVector(2), false);
        let other = ColumnDescriptor::new("t.w", Type::FloatVector(3), false);
        let out = ColumnDescriptor::new("d", Type::Double, false);
        assert!(FunctionCall::new(
            FunctionKind::InnerProduct,
            vec![Binding::Column(vector.clone()), Binding::Column(other)],
            out.clone()
        )
        .is_err());
        assert!(FunctionCall::new(FunctionKind::InnerProduct, vec![Binding::Column(vector)], out).is_err());
    }

    #[test]
    fn test_cost_grows_with_dimension() {
        let (call, _, _) = create_test_call(FunctionKind::EuclideanDistance);
        assert_eq!(call.columns().len(), 1);
        assert!(call.cost().cpu > 0.0);
        assert_eq!(call.dimension(), 2);
    }
}
