/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::types::Type;
use crate::value::Value;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Per-column statistics used for selectivity and width estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueStatistics {
    pub entries: u64,
    pub null_entries: u64,
    pub distinct_entries: u64,
    pub avg_width: usize,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

impl ValueStatistics {
    /// Collects statistics over a column's values.
    pub fn from_values<'a>(logical_type: Type, values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut stats = ValueStatistics::default();
        let mut distinct = FxHashSet::default();
        let mut total_width = 0usize;

        for value in values {
            stats.entries += 1;
            if value.is_null() {
                stats.null_entries += 1;
                continue;
            }
            total_width += match value {
                Value::String(s) => s.len(),
                _ => logical_type.physical_size(),
            };
            distinct.insert(value.to_string());
            if stats.min.as_ref().map_or(true, |m| value.compare(m) == Some(Ordering::Less)) {
                stats.min = Some(value.clone());
            }
            if stats.max.as_ref().map_or(true, |m| value.compare(m) == Some(Ordering::Greater)) {
                stats.max = Some(value.clone());
            }
        }

        let non_null = stats.entries - stats.null_entries;
        stats.distinct_entries = distinct.len() as u64;
        stats.avg_width = if non_null > 0 {
            total_width / non_null as usize
        } else {
            logical_type.physical_size()
        };
        stats
    }

    /// Fraction of rows matching an equality test, if distinct counts are known.
    pub fn equality_selectivity(&self) -> Option<f64> {
        if self.distinct_entries == 0 {
            None
        } else {
            Some(1.0 / self.distinct_entries as f64)
        }
    }

    pub fn null_fraction(&self) -> Option<f64> {
        if self.entries == 0 {
            None
        } else {
            Some(self.null_entries as f64 / self.entries as f64)
        }
    }
}
