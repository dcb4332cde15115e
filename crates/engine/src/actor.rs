// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live machine instance and its persisted snapshot

use crate::machine::{ContextOp, Event, Machine, StateKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stepwise_core::SubstepRef;
use thiserror::Error;

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Data carried alongside the current state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineContext {
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_substep: Option<SubstepRef>,
    /// Raised by `GOTO NEXT`; cleared at the start of every send
    #[serde(default)]
    pub next_instance: bool,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Serializable machine position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub version: u32,
    pub state: StateKey,
    pub context: MachineContext,
    /// Message from the STOP/COMPLETE that ended the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MachineSnapshot {
    /// Snapshot positioned at `state` with a fresh context
    pub fn at(state: StateKey) -> Self {
        let current_substep = match &state {
            StateKey::Step { substep, .. } => substep.clone(),
            StateKey::Complete | StateKey::Stopped => None,
        };
        Self {
            version: SNAPSHOT_VERSION,
            state,
            context: MachineContext {
                current_substep,
                ..MachineContext::default()
            },
            message: None,
        }
    }
}

/// Errors that can occur when restoring an actor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },
    #[error("snapshot state '{0}' is not part of this runbook")]
    UnknownState(String),
}

/// A machine plus its current position
#[derive(Debug, Clone)]
pub struct MachineActor {
    machine: Machine,
    state: StateKey,
    context: MachineContext,
    message: Option<String>,
}

impl MachineActor {
    /// Start at the machine's initial state
    pub fn new(machine: Machine) -> Self {
        let snapshot = MachineSnapshot::at(machine.initial_state().clone());
        Self {
            machine,
            state: snapshot.state,
            context: snapshot.context,
            message: None,
        }
    }

    /// Resume from a persisted snapshot
    pub fn restore(machine: Machine, snapshot: MachineSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
            });
        }
        if !machine.contains(&snapshot.state) {
            return Err(SnapshotError::UnknownState(snapshot.state.to_string()));
        }
        Ok(Self {
            machine,
            state: snapshot.state,
            context: snapshot.context,
            message: snapshot.message,
        })
    }

    /// Feed one event and return the resulting state
    pub fn send(&mut self, event: Event) -> &StateKey {
        self.context.next_instance = false;

        let Some(transition) = self.machine.select(&self.state, &self.context, &event) else {
            tracing::debug!(state = %self.state, ?event, "event ignored");
            return &self.state;
        };

        for op in &transition.ops {
            match op {
                ContextOp::ResetRetry => self.context.retry_count = 0,
                ContextOp::IncrementRetry => {
                    self.context.retry_count = self.context.retry_count.saturating_add(1)
                }
                ContextOp::RaiseNextInstance => self.context.next_instance = true,
            }
        }
        if let StateKey::Step { substep, .. } = &transition.target {
            self.context.current_substep = substep.clone();
        }
        if transition.target.is_terminal() {
            self.message = transition.message;
        }

        tracing::debug!(
            from = %self.state,
            to = %transition.target,
            ?event,
            retry_count = self.context.retry_count,
            "transition"
        );
        self.state = transition.target;
        &self.state
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            version: SNAPSHOT_VERSION,
            state: self.state.clone(),
            context: self.context.clone(),
            message: self.message.clone(),
        }
    }

    pub fn state(&self) -> &StateKey {
        &self.state
    }

    pub fn context(&self) -> &MachineContext {
        &self.context
    }

    /// Mutable access for host-owned variables
    pub fn variables_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.context.variables
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
