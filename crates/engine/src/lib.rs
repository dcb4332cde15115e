// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Stepwise execution engine: runbook compiler, actor and evaluator

mod actor;
mod evaluator;
mod executor;
mod machine;

pub use actor::{MachineActor, MachineContext, MachineSnapshot, SnapshotError, SNAPSHOT_VERSION};
pub use evaluator::{
    evaluate_fail, evaluate_pass, evaluate_substep_aggregation, ConditionResult, StepResult,
    SubstepState, SubstepStatus,
};
pub use executor::{step_event, ExecResult, ExecuteError, Executor, TracedExecutor};
pub use machine::{
    CompileError, ContextOp, Event, Guard, Machine, StateKey, StateNode, Transition,
};

#[cfg(any(test, feature = "test-support"))]
pub use executor::{ExecCall, FakeExecutor};
