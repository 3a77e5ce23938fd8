/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Cost-based query planner
//!
//! Planning runs in two stages for every group of a logical plan:
//!
//! - the logical tree is rewritten with the logical rules,
//! - every logical candidate is implemented 1:1 and rewritten with the
//!   physical rules.
//!
//! The executable physical candidates are ranked by the cost policy and the
//! winners of all groups are composed into the final plan.
//!
//! ## Modules
//!
//! - `operators`: Logical and physical operator trees
//! - `cost`: Cost model, cost policy and per-node estimation
//! - `rules`: Rewrite rules and the exploration loop
//! - `cache`: Plan cache keyed by logical digest
//! - `optimizer`: The planner itself

pub mod cache;
pub mod cost;
pub mod operators;
pub mod optimizer;
pub mod rules;

pub use cache::{PlanCache, PlanCacheStats};
pub use cost::{Cost, CostEstimator, CostPolicy};
pub use operators::{LogicalKind, LogicalNode, PhysicalKind, PhysicalNode, PlanNode, Position};
pub use optimizer::QueryPlanner;
pub use rules::{RewriteRule, RuleGroup};
