/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Error types shared by planning and execution.

use crate::{Digest, GroupId};
use thiserror::Error;

/// Coarse classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The query cannot be planned as stated.
    Planning,
    /// A bug in the engine: a rule, a node or the context was misused.
    Internal,
    /// The query failed while running.
    Execution,
    /// The engine configuration is invalid.
    Configuration,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("failed to generate an executable physical plan for query {query_id} (digest {digest:#018x})")]
    NoPhysicalPlan { query_id: String, digest: Digest },

    #[error("entity '{0}' does not exist")]
    UnknownEntity(String),

    #[error("no sub-plan registered for group {0}")]
    UnknownGroup(GroupId),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{node} expects {expected} input(s) but {actual} were given")]
    ArityMismatch {
        node: &'static str,
        expected: String,
        actual: usize,
    },

    #[error("rule {rule} cannot be applied to {node}")]
    RuleMisapplied {
        rule: &'static str,
        node: &'static str,
    },

    #[error("query context {query_id} has been closed")]
    ContextClosed { query_id: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("query execution was cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::NoPhysicalPlan { .. }
            | QueryError::UnknownEntity(_)
            | QueryError::UnknownGroup(_)
            | QueryError::InvalidQuery(_) => ErrorKind::Planning,
            QueryError::ArityMismatch { .. }
            | QueryError::RuleMisapplied { .. }
            | QueryError::ContextClosed { .. }
            | QueryError::Internal(_) => ErrorKind::Internal,
            QueryError::Storage(_) | QueryError::TypeMismatch(_) | QueryError::Cancelled => {
                ErrorKind::Execution
            }
            QueryError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        QueryError::InvalidQuery(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        QueryError::Internal(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        QueryError::Storage(message.into())
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        QueryError::TypeMismatch(message.into())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let error = QueryError::ArityMismatch {
            node: "Filter",
            expected: "1".to_string(),
            actual: 2,
        };
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert_eq!(error.to_string(), "Filter expects 1 input(s) but 2 were given");
        assert_eq!(
            QueryError::UnknownEntity("t".into()).kind(),
            ErrorKind::Planning
        );
        assert_eq!(QueryError::Cancelled.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_no_physical_plan_message() {
        let error = QueryError::NoPhysicalPlan {
            query_id: "q1".into(),
            digest: 0xff,
        };
        assert_eq!(
            error.to_string(),
            "failed to generate an executable physical plan for query q1 (digest 0x00000000000000ff)"
        );
    }
}
