/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Logical and physical operator trees.
//!
//! Both trees are persistent: nodes are immutable, shared through `Arc`, and
//! every rewrite builds new nodes along the changed path only. Columns,
//! traits, digests and (for physical nodes) costs are derived once, when a
//! node is constructed.

pub mod logical;
pub mod physical;
pub mod position;
pub mod traits;

pub use logical::{LogicalKind, LogicalNode, Projection};
pub use physical::{PhysicalKind, PhysicalNode};
pub use position::Position;
pub use traits::{Trait, TraitKind, Traits};

use crate::error::{QueryError, Result};
use crate::{Digest, GroupId};
use rustc_hash::FxHasher;
use shared::ColumnDescriptor;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Number of inputs an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Nullary,
    Unary,
    Binary,
    NAry,
}

impl Arity {
    pub fn accepts(&self, inputs: usize) -> bool {
        match self {
            Arity::Nullary => inputs == 0,
            Arity::Unary => inputs == 1,
            Arity::Binary => inputs == 2,
            Arity::NAry => inputs >= 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Nullary => write!(f, "0"),
            Arity::Unary => write!(f, "1"),
            Arity::Binary => write!(f, "2"),
            Arity::NAry => write!(f, "at least 1"),
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// Common surface of logical and physical nodes, used by [`Position`] and the
/// rewrite rules.
pub trait PlanNode: private::Sealed + fmt::Debug + Send + Sync + Sized + 'static {
    fn name(&self) -> &'static str;

    fn group_id(&self) -> GroupId;

    fn arity(&self) -> Arity;

    fn inputs(&self) -> &[Arc<Self>];

    /// Columns produced by this node, in output order.
    fn columns(&self) -> &[ColumnDescriptor];

    /// Columns this node reads from its (first) input.
    fn requires(&self) -> Vec<ColumnDescriptor>;

    fn traits(&self) -> &Traits;

    /// Structural hash over the node, its data and its inputs. Literal values
    /// are not part of it.
    fn digest(&self) -> Digest;

    /// Creates a copy of this node on top of new inputs.
    fn copy_with_inputs(&self, inputs: Vec<Arc<Self>>) -> Result<Arc<Self>>;

    fn has_trait(&self, kind: TraitKind) -> bool {
        self.traits().contains(kind)
    }

    /// Whether this node or any node below it matches.
    fn any(&self, predicate: &dyn Fn(&Self) -> bool) -> bool {
        predicate(self) || self.inputs().iter().any(|i| i.any(predicate))
    }
}

pub(crate) fn check_arity(node: &'static str, arity: Arity, actual: usize) -> Result<()> {
    if arity.accepts(actual) {
        Ok(())
    } else {
        Err(QueryError::ArityMismatch {
            node,
            expected: arity.to_string(),
            actual,
        })
    }
}

/// Fails unless every required column is available.
pub(crate) fn check_columns(
    node: &'static str,
    available: &[ColumnDescriptor],
    required: &[ColumnDescriptor],
) -> Result<()> {
    match required.iter().find(|c| !available.contains(c)) {
        Some(missing) => Err(QueryError::invalid_query(format!(
            "{} requires column {} which its input does not produce",
            node, missing.name
        ))),
        None => Ok(()),
    }
}

/// Appends `extra` to `columns`, failing on duplicates.
pub(crate) fn append_columns(
    node: &'static str,
    columns: &[ColumnDescriptor],
    extra: &[ColumnDescriptor],
) -> Result<Vec<ColumnDescriptor>> {
    let mut result = columns.to_vec();
    for column in extra {
        if result.contains(column) {
            return Err(QueryError::invalid_query(format!(
                "{} would produce column {} twice",
                node, column.name
            )));
        }
        result.push(column.clone());
    }
    Ok(result)
}

/// Accumulates the digest of a node.
pub(crate) struct DigestBuilder(FxHasher);

impl DigestBuilder {
    pub(crate) fn new(name: &'static str, group_id: GroupId) -> Self {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        group_id.hash(&mut hasher);
        DigestBuilder(hasher)
    }

    pub(crate) fn write<T: Hash + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.hash(&mut self.0);
        self
    }

    pub(crate) fn finish<N: PlanNode>(
        mut self,
        columns: &[ColumnDescriptor],
        traits: &Traits,
        inputs: &[Arc<N>],
    ) -> Digest {
        columns.hash(&mut self.0);
        traits.hash(&mut self.0);
        for input in inputs {
            input.digest().hash(&mut self.0);
        }
        self.0.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(Arity::Nullary.accepts(0));
        assert!(!Arity::Unary.accepts(2));
        assert!(Arity::NAry.accepts(3));
        assert!(!Arity::NAry.accepts(0));
        assert!(check_arity("Filter", Arity::Unary, 0).is_err());
    }
}
