/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Streaming execution of physical plans
//!
//! Every operator runs on its own thread and hands tuples to its parent
//! through a bounded channel. A shared [`CancellationToken`] stops the whole
//! pipeline: it is set when the caller drops the [`ResultStream`] or when an
//! operator fails, in which case the first error is kept and reported to the
//! caller.

pub mod engine;
pub mod operator;

pub use engine::{ExecutionEngine, ResultStream};
pub use operator::Operator;

use crate::error::{QueryError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Information about a query, reported alongside its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMetadata {
    pub transaction_id: i64,
    pub query_id: String,
    pub planning_duration: Duration,
    pub execution_duration: Duration,
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    error: Mutex<Option<QueryError>>,
}

/// Cancellation flag shared by all operators of one pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    /// Cancels the pipeline because of `error`. Only the first error is kept.
    pub fn fail(&self, error: QueryError) {
        {
            let mut slot = self.state.error.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(error);
            }
        }
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// The error that cancelled the pipeline, if any.
    pub fn error(&self) -> Option<QueryError> {
        self.state
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}
