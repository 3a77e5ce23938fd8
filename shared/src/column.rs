/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Describes a column by its fully qualified name (`entity.column`) and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub logical_type: Type,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, logical_type: Type, nullable: bool) -> Self {
        ColumnDescriptor {
            name: name.into(),
            logical_type,
            nullable,
        }
    }

    /// Builds the descriptor of a column that belongs to an entity.
    pub fn qualified(entity: &str, column: &str, logical_type: Type, nullable: bool) -> Self {
        Self::new(format!("{}.{}", entity, column), logical_type, nullable)
    }

    /// Name of the entity this column belongs to, if qualified.
    pub fn entity(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(entity, _)| entity)
    }

    /// Column name without the entity prefix.
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, column)| column)
            .unwrap_or(&self.name)
    }

    /// Estimated width in bytes, using the average width for strings when known.
    pub fn width(&self, avg_width: Option<usize>) -> usize {
        match (self.logical_type, avg_width) {
            (Type::String, Some(width)) if width > 0 => width,
            (logical_type, _) => logical_type.physical_size(),
        }
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.logical_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name() {
        let column = ColumnDescriptor::qualified("warren.features", "id", Type::Long, false);
        assert_eq!(column.name, "warren.features.id");
        assert_eq!(column.entity(), Some("warren.features"));
        assert_eq!(column.simple_name(), "id");
    }

    #[test]
    fn test_width() {
        let column = ColumnDescriptor::new("t.s", Type::String, true);
        assert_eq!(column.width(None), Type::DEFAULT_STRING_WIDTH);
        assert_eq!(column.width(Some(12)), 12);
        let vector = ColumnDescriptor::new("t.v", Type::FloatVector(8), false);
        assert_eq!(vector.width(Some(12)), 32);
    }
}
