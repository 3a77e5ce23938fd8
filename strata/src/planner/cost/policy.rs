/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::model::Cost;
use serde::{Deserialize, Serialize};

/// Turns a multi-dimensional [`Cost`] into a scalar score and decides on the
/// degree of intra-query parallelism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostPolicy {
    pub w_io: f64,
    pub w_cpu: f64,
    pub w_memory: f64,
    /// Fraction of a worker's throughput gained by each additional worker.
    pub speedup_per_worker: f64,
    /// Fraction of parallelisable IO that stays serial (shared storage bandwidth).
    pub non_parallelisable_io: f64,
}

impl Default for CostPolicy {
    fn default() -> Self {
        CostPolicy {
            w_io: 0.6,
            w_cpu: 0.3,
            w_memory: 0.1,
            speedup_per_worker: 0.5,
            non_parallelisable_io: 0.5,
        }
    }
}

impl CostPolicy {
    /// Fixed price paid for every additional partition.
    pub const PARTITION_OVERHEAD: Cost = Cost::cpu(1e-2);

    /// Weighted sum of the cost dimensions. Lower is better.
    pub fn to_score(&self, cost: &Cost) -> f64 {
        self.w_io * cost.io + self.w_cpu * cost.cpu + self.w_memory * cost.memory
    }

    /// Picks the number of partitions in `1..=max` that minimises the estimated
    /// run time, following Amdahl's law.
    pub fn parallelisation(&self, parallelisable: &Cost, total: &Cost, max: usize) -> usize {
        if max < 2 {
            return 1;
        }
        let total_score = self.to_score(total);
        if total_score <= 0.0 {
            return 1;
        }

        let parallel = Cost::new(
            parallelisable.io * (1.0 - self.non_parallelisable_io.clamp(0.0, 1.0)),
            parallelisable.cpu,
            parallelisable.memory,
        );
        let parallel_score = self.to_score(&parallel).min(total_score);
        let serial_score = total_score - parallel_score;
        let overhead = self.to_score(&Self::PARTITION_OVERHEAD);

        let mut best = (1, total_score);
        for partitions in 2..=max {
            let speedup = 1.0 + (partitions - 1) as f64 * self.speedup_per_worker;
            let time = serial_score + parallel_score / speedup + (partitions - 1) as f64 * overhead;
            if time < best.1 {
                best = (partitions, time);
            }
        }
        best.0
    }
}
