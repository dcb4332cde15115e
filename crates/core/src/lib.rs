// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stepwise-core: shared vocabulary for the stepwise runbook engine
//!
//! This crate provides:
//! - Step and substep references (`StepId`) with their DSL text form
//! - The action model used by PASS/FAIL transitions
//! - Clock and id-generation seams for testable persistence

pub mod action;
pub mod clock;
pub mod id;
pub mod step_id;

pub use action::{Action, NonRetryAction, SideKind, TransitionSide, Transitions};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use step_id::{
    is_reserved, is_valid_name, StepId, StepIdError, StepRef, SubstepRef, MAX_STEP_NUMBER,
    RESERVED_WORDS,
};
