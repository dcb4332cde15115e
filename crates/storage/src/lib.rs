// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Persistent execution state for stepwise runs

mod config;
mod error;
mod manager;
mod state;
mod store;

pub use config::{StoreConfig, DEFAULT_LOCK_TIMEOUT, STATE_DIR_ENV};
pub use error::{ErrorReport, StateError};
pub use manager::StateManager;
pub use state::{
    AgentBinding, BindingStatus, BindingUpdate, CreateOptions, PendingStep, RunAction, Session,
    WorkflowState, COMPLETED_VAR, MESSAGE_VAR, STOPPED_VAR,
};
pub use store::{read_json, remove, write_json, StoreLock};
