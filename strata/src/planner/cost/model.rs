/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// Multi-dimensional cost of executing (part of) a plan. All dimensions are
/// non-negative and compose additively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Estimated time spent waiting for storage, in seconds.
    pub io: f64,
    /// Estimated CPU time, in seconds.
    pub cpu: f64,
    /// Estimated memory held by the operator, in bytes.
    pub memory: f64,
}

impl Cost {
    pub const ZERO: Cost = Cost::new(0.0, 0.0, 0.0);

    /// Reading one byte from disk.
    pub const DISK_ACCESS_READ: Cost = Cost::new(1e-4, 0.0, 0.0);

    /// Writing one byte to disk.
    pub const DISK_ACCESS_WRITE: Cost = Cost::new(5e-4, 0.0, 0.0);

    /// Touching one byte in memory.
    pub const MEMORY_ACCESS: Cost = Cost::new(0.0, 1e-8, 0.0);

    /// A single floating point operation.
    pub const FLOP: Cost = Cost::new(0.0, 1e-9, 0.0);

    pub const fn new(io: f64, cpu: f64, memory: f64) -> Self {
        Cost { io, cpu, memory }
    }

    pub const fn io(io: f64) -> Self {
        Cost::new(io, 0.0, 0.0)
    }

    pub const fn cpu(cpu: f64) -> Self {
        Cost::new(0.0, cpu, 0.0)
    }

    pub const fn memory(memory: f64) -> Self {
        Cost::new(0.0, 0.0, memory)
    }

    /// Divides every dimension by the matching dimension of `reference`,
    /// leaving dimensions with a zero reference at zero.
    pub fn normalize(&self, reference: &Cost) -> Cost {
        let ratio = |value: f64, max: f64| if max > 0.0 { value / max } else { 0.0 };
        Cost::new(
            ratio(self.io, reference.io),
            ratio(self.cpu, reference.cpu),
            ratio(self.memory, reference.memory),
        )
    }

    /// Dimension-wise maximum over a set of costs.
    pub fn max_of<'a>(costs: impl IntoIterator<Item = &'a Cost>) -> Cost {
        costs.into_iter().fold(Cost::ZERO, |acc, c| {
            Cost::new(acc.io.max(c.io), acc.cpu.max(c.cpu), acc.memory.max(c.memory))
        })
    }

    pub fn is_zero(&self) -> bool {
        self.io == 0.0 && self.cpu == 0.0 && self.memory == 0.0
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(self.io + rhs.io, self.cpu + rhs.cpu, self.memory + rhs.memory)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = *self + rhs;
    }
}

impl Sub for Cost {
    type Output = Cost;

    /// Saturates at zero in every dimension.
    fn sub(self, rhs: Cost) -> Cost {
        Cost::new(
            (self.io - rhs.io).max(0.0),
            (self.cpu - rhs.cpu).max(0.0),
            (self.memory - rhs.memory).max(0.0),
        )
    }
}

impl Mul<f64> for Cost {
    type Output = Cost;

    fn mul(self, factor: f64) -> Cost {
        Cost::new(self.io * factor, self.cpu * factor, self.memory * factor)
    }
}

impl Div<f64> for Cost {
    type Output = Cost;

    fn div(self, divisor: f64) -> Cost {
        if divisor == 0.0 {
            return Cost::ZERO;
        }
        Cost::new(self.io / divisor, self.cpu / divisor, self.memory / divisor)
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, Add::add)
    }
}
