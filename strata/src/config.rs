/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Engine configuration, loadable from JSON.

use crate::error::{QueryError, Result};
use crate::planner::cost::CostPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default cost policy, used when a query carries no cost policy hint.
    pub cost: CostPolicy,
    pub cache: CacheConfig,
    pub planner: PlannerConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of physical plans kept in the plan cache.
    pub plan_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            plan_cache_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Upper bound on the number of positions visited per exploration stage.
    pub exploration_budget: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            exploration_budget: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Capacity of the bounded channels connecting operators.
    pub channel_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| QueryError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution.channel_capacity == 0 {
            return Err(QueryError::Configuration(
                "execution.channel_capacity must be greater than zero".into(),
            ));
        }
        if self.planner.exploration_budget == 0 {
            return Err(QueryError::Configuration(
                "planner.exploration_budget must be greater than zero".into(),
            ));
        }
        let weights = [self.cost.w_io, self.cost.w_cpu, self.cost.w_memory];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(QueryError::Configuration(
                "cost weights must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.plan_cache_size, 100);
        assert_eq!(config.planner.exploration_budget, 10_000);
        assert_eq!(config.execution.channel_capacity, 1024);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{ "cache": { "plan_cache_size": 5 }, "cost": { "w_io": 1.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.cache.plan_cache_size, 5);
        assert_eq!(config.cost.w_io, 1.0);
        assert_eq!(config.cost.w_cpu, CostPolicy::default().w_cpu);
        assert_eq!(config.execution.channel_capacity, 1024);
    }

    #[test]
    fn test_invalid_json() {
        let error = EngineConfig::from_json_str(r#"{ "execution": { "channel_capacity": 0 } }"#)
            .unwrap_err();
        assert!(matches!(error, QueryError::Configuration(_)));
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let error = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(error, QueryError::Configuration(_)));
    }
}
