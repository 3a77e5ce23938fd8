/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use shared::{ColumnDescriptor, SortOrder};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraitKind {
    NotPartitionable,
    Order,
    Limit,
}

/// A property of the output of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trait {
    /// The node has side effects or global semantics and must run serially.
    NotPartitionable,
    /// The output is sorted by the given columns.
    Order(Vec<(ColumnDescriptor, SortOrder)>),
    /// The output holds at most `limit` tuples.
    Limit { limit: i64 },
}

impl Trait {
    pub fn kind(&self) -> TraitKind {
        match self {
            Trait::NotPartitionable => TraitKind::NotPartitionable,
            Trait::Order(_) => TraitKind::Order,
            Trait::Limit { .. } => TraitKind::Limit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Traits(BTreeMap<TraitKind, Trait>);

impl Traits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, value: Trait) -> Self {
        self.insert(value);
        self
    }

    pub fn insert(&mut self, value: Trait) {
        self.0.insert(value.kind(), value);
    }

    pub fn remove(&mut self, kind: TraitKind) -> Option<Trait> {
        self.0.remove(&kind)
    }

    pub fn get(&self, kind: TraitKind) -> Option<&Trait> {
        self.0.get(&kind)
    }

    pub fn contains(&self, kind: TraitKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn order(&self) -> Option<&[(ColumnDescriptor, SortOrder)]> {
        match self.0.get(&TraitKind::Order) {
            Some(Trait::Order(order)) => Some(order),
            _ => None,
        }
    }

    pub fn limit(&self) -> Option<i64> {
        match self.0.get(&TraitKind::Limit) {
            Some(Trait::Limit { limit }) => Some(*limit),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trait> {
        self.0.values()
    }

    /// Keeps only the traits that survive a row-local operator: order and
    /// limit carry over, partitioning constraints do not.
    pub(crate) fn inherited(&self) -> Traits {
        let mut traits = Traits::new();
        for kind in [TraitKind::Order, TraitKind::Limit] {
            if let Some(value) = self.get(kind) {
                traits.insert(value.clone());
            }
        }
        traits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Type;

    #[test]
    fn test_one_trait_per_kind() {
        let column = ColumnDescriptor::new("t.a", Type::Int, false);
        let mut traits = Traits::new()
            .with(Trait::Limit { limit: 10 })
            .with(Trait::Limit { limit: 5 })
            .with(Trait::Order(vec![(column.clone(), SortOrder::Ascending)]));
        assert_eq!(traits.limit(), Some(5));
        assert_eq!(traits.order().map(|o| o.len()), Some(1));
        assert_eq!(traits.iter().count(), 2);
        traits.insert(Trait::NotPartitionable);
        let inherited = traits.inherited();
        assert!(!inherited.contains(TraitKind::NotPartitionable));
        assert!(inherited.contains(TraitKind::Order));
        assert_eq!(traits.remove(TraitKind::Limit), Some(Trait::Limit { limit: 5 }));
    }
}
