/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a column or a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    /// Dense vector of 32-bit floats with a fixed dimension.
    FloatVector(usize),
}

impl Type {
    /// Width assumed for strings when no statistics are available.
    pub const DEFAULT_STRING_WIDTH: usize = 32;

    /// Size in bytes of a single value of this type.
    pub fn physical_size(&self) -> usize {
        match self {
            Type::Boolean => 1,
            Type::Int | Type::Float => 4,
            Type::Long | Type::Double => 8,
            Type::String => Self::DEFAULT_STRING_WIDTH,
            Type::FloatVector(dimension) => 4 * dimension,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Long | Type::Float | Type::Double)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::FloatVector(_))
    }

    /// Number of scalar components; 1 for every non-vector type.
    pub fn logical_size(&self) -> usize {
        match self {
            Type::FloatVector(dimension) => *dimension,
            _ => 1,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "BOOLEAN"),
            Type::Int => write!(f, "INT"),
            Type::Long => write!(f, "LONG"),
            Type::Float => write!(f, "FLOAT"),
            Type::Double => write!(f, "DOUBLE"),
            Type::String => write!(f, "STRING"),
            Type::FloatVector(dimension) => write!(f, "FLOAT_VECTOR({})", dimension),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "ASC"),
            SortOrder::Descending => write!(f, "DESC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_size() {
        assert_eq!(Type::Int.physical_size(), 4);
        assert_eq!(Type::Double.physical_size(), 8);
        assert_eq!(Type::FloatVector(128).physical_size(), 512);
        assert_eq!(Type::FloatVector(128).logical_size(), 128);
    }

    #[test]
    fn test_type_serialization() {
        let json = serde_json::to_string(&Type::FloatVector(3)).unwrap();
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Type::FloatVector(3));
    }
}
