/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod estimator;
pub mod model;
pub mod policy;

pub use estimator::CostEstimator;
pub use model::Cost;
pub use policy::CostPolicy;
