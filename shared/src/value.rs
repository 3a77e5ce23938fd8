/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single cell of a tuple or a bound literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    FloatVector(Vec<f32>),
}

impl Value {
    /// Logical type of this value, `None` for `Null`.
    pub fn logical_type(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Type::Boolean),
            Value::Int(_) => Some(Type::Int),
            Value::Long(_) => Some(Type::Long),
            Value::Float(_) => Some(Type::Float),
            Value::Double(_) => Some(Type::Double),
            Value::String(_) => Some(Type::String),
            Value::FloatVector(v) => Some(Type::FloatVector(v.len())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Checks whether this value can be stored in a slot of the given type.
    /// `Null` fits every type; nullability is checked elsewhere.
    pub fn fits(&self, logical_type: Type) -> bool {
        match self.logical_type() {
            None => true,
            Some(own) => own == logical_type,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Value::FloatVector(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Compares two values. Numeric values compare across widths; `Null` and
    /// incompatible types are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Long(b)) => Some((*a as i64).cmp(b)),
            (Value::Long(a), Value::Int(b)) => Some(a.cmp(&(*b as i64))),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::FloatVector(a), Value::FloatVector(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.partial_cmp(y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(Ordering::Equal)
            }
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Equality in the sense of `compare`; `Null` never equals anything.
    pub fn is_equal(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
            Value::FloatVector(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatVector(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_numeric_compare() {
        assert_eq!(Value::Int(3).compare(&Value::Long(3)), Some(Ordering::Equal));
        assert_eq!(Value::Int(2).compare(&Value::Double(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Float(1.0).compare(&Value::Long(0)), Some(Ordering::Greater));
    }

    #[test]
    fn test_null_is_unordered() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert!(!Value::Null.is_equal(&Value::Null));
    }

    #[test]
    fn test_incompatible_types() {
        assert_eq!(Value::String("a".into()).compare(&Value::Int(1)), None);
        assert_eq!(
            Value::FloatVector(vec![1.0]).compare(&Value::FloatVector(vec![1.0, 2.0])),
            None
        );
    }

    #[test]
    fn test_fits() {
        assert!(Value::Null.fits(Type::String));
        assert!(Value::Long(1).fits(Type::Long));
        assert!(!Value::Int(1).fits(Type::Long));
        assert!(Value::FloatVector(vec![0.0; 4]).fits(Type::FloatVector(4)));
    }
}
