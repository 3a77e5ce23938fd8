/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Query planning and execution for an embedded vector and relational database.
//!
//! A query enters as a logical operator tree registered with a
//! [`QueryContext`]. The [`QueryPlanner`] rewrites it with logical and
//! physical rules, ranks the candidates with the cost model and caches the
//! winner by digest. The context then turns the physical plan into an
//! executable operator tree, partitioning it when that pays off, and the
//! [`ExecutionEngine`] runs it as a pipeline of threads.

pub mod binding;
pub mod catalogue;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod function;
pub mod hints;
pub mod planner;
pub mod predicate;

#[cfg(test)]
pub(crate) mod test_support;

/// Identifies a sub-plan within a query.
pub type GroupId = i64;

/// Structural hash of a plan.
pub type Digest = u64;

pub use binding::{Binding, BindingContext};
pub use config::EngineConfig;
pub use context::QueryContext;
pub use error::{ErrorKind, QueryError, Result};
pub use execution::{ExecutionEngine, QueryMetadata, ResultStream};
pub use hints::{IndexHint, QueryHint};
pub use planner::{PlanCache, QueryPlanner};
