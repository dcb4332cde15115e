// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command executor contract
//!
//! The core never runs shell commands itself. Hosts plug in an
//! [`Executor`] and turn its result into a machine [`Event`].

use crate::evaluator::StepResult;
use crate::machine::Event;
use std::path::Path;
use thiserror::Error;

/// Errors an executor may report instead of an exit status
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("failed to start command: {0}")]
    Spawn(String),
    #[error("command denied: {0}")]
    Denied(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Exit status of a finished command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub success: bool,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    pub fn result(&self) -> StepResult {
        if self.success {
            StepResult::Pass
        } else {
            StepResult::Fail
        }
    }
}

/// Runs a step's command in a working directory
pub trait Executor {
    fn execute(&self, command: &str, cwd: &Path) -> Result<ExecResult, ExecuteError>;
}

/// Map a command result to the event the machine should receive
pub fn step_event(result: &ExecResult) -> Event {
    Event::from(result.result())
}

impl From<StepResult> for Event {
    fn from(result: StepResult) -> Self {
        match result {
            StepResult::Pass => Event::Pass,
            StepResult::Fail => Event::Fail,
        }
    }
}

/// Wrapper that adds tracing to any Executor
#[derive(Clone)]
pub struct TracedExecutor<E> {
    inner: E,
}

impl<E> TracedExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: Executor> Executor for TracedExecutor<E> {
    fn execute(&self, command: &str, cwd: &Path) -> Result<ExecResult, ExecuteError> {
        let span = tracing::info_span!("executor.execute", cwd = %cwd.display());
        let _guard = span.enter();

        tracing::info!(command, "starting");

        let start = std::time::Instant::now();
        let result = self.inner.execute(command, cwd);
        let elapsed = start.elapsed();

        match &result {
            Ok(status) => tracing::info!(
                success = status.success,
                exit_code = status.exit_code,
                elapsed_ms = elapsed.as_millis() as u64,
                "finished"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "execute failed"
            ),
        }

        result
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ExecResult, ExecuteError, Executor};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// Recorded executor call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ExecCall {
        pub command: String,
        pub cwd: PathBuf,
    }

    /// Scripted executor for tests
    ///
    /// Returns queued results in order, then success once the queue is empty.
    #[derive(Clone, Default)]
    pub struct FakeExecutor {
        results: Arc<Mutex<VecDeque<ExecResult>>>,
        calls: Arc<Mutex<Vec<ExecCall>>>,
    }

    impl FakeExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue results to hand out in order
        pub fn with_results(results: impl IntoIterator<Item = ExecResult>) -> Self {
            let fake = Self::default();
            fake.results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend(results);
            fake
        }

        pub fn push_result(&self, result: ExecResult) {
            self.results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(result);
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<ExecCall> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    impl Executor for FakeExecutor {
        fn execute(&self, command: &str, cwd: &Path) -> Result<ExecResult, ExecuteError> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(ExecCall {
                    command: command.to_string(),
                    cwd: cwd.to_path_buf(),
                });
            let next = self
                .results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();
            Ok(next.unwrap_or_else(ExecResult::success))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{ExecCall, FakeExecutor};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
