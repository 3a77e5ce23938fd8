/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Per-query hints that steer planning and execution.

use crate::catalogue::{Index, IndexType};
use crate::planner::cost::CostPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryHint {
    /// Overrides the catalogue's default cost policy.
    CostPolicy(CostPolicy),
    /// Restricts which indexes the planner may use.
    Index(IndexHint),
    /// Bounds the number of partitions; `min` overrides the cost-based choice.
    Parallelism { min: Option<usize>, max: usize },
    /// Disables intra-query partitioning.
    NoParallel,
    /// Ignores cached plans.
    BypassPlanCache,
    /// Does not store the resulting plan in the cache.
    NoPlanCacheUpdate,
    /// Skips cost-based search and implements the logical plan as is.
    NoOptimisation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexHint {
    /// No index may be used.
    None,
    /// Only the index with this name.
    Name(String),
    /// Only indexes of this type.
    Type(IndexType),
    /// Inexact indexes are allowed as well.
    Inexact,
}

impl IndexHint {
    pub fn matches(&self, index: &dyn Index) -> bool {
        match self {
            IndexHint::None => false,
            IndexHint::Name(name) => index.name() == name,
            IndexHint::Type(index_type) => index.index_type() == *index_type,
            IndexHint::Inexact => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHints {
    hints: Vec<QueryHint>,
}

impl QueryHints {
    pub fn new(hints: Vec<QueryHint>) -> Self {
        QueryHints { hints }
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryHint> {
        self.hints.iter()
    }

    pub fn cost_policy(&self) -> Option<&CostPolicy> {
        self.hints.iter().find_map(|h| match h {
            QueryHint::CostPolicy(policy) => Some(policy),
            _ => None,
        })
    }

    pub fn index(&self) -> Option<&IndexHint> {
        self.hints.iter().find_map(|h| match h {
            QueryHint::Index(hint) => Some(hint),
            _ => None,
        })
    }

    pub fn parallelism(&self) -> Option<(Option<usize>, usize)> {
        self.hints.iter().find_map(|h| match h {
            QueryHint::Parallelism { min, max } => Some((*min, *max)),
            _ => None,
        })
    }

    /// Whether an index may be used. Without an index hint, only exact indexes qualify.
    pub fn allows(&self, index: &dyn Index) -> bool {
        match self.index() {
            Some(hint) => hint.matches(index),
            None => index.is_exact(),
        }
    }

    pub fn no_parallel(&self) -> bool {
        self.hints.contains(&QueryHint::NoParallel)
    }

    pub fn bypass_plan_cache(&self) -> bool {
        self.hints.contains(&QueryHint::BypassPlanCache)
    }

    pub fn no_plan_cache_update(&self) -> bool {
        self.hints.contains(&QueryHint::NoPlanCacheUpdate)
    }

    pub fn no_optimisation(&self) -> bool {
        self.hints.contains(&QueryHint::NoOptimisation)
    }
}
