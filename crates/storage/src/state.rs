// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted run and session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use stepwise_core::{StepId, StepRef, SubstepRef};
use stepwise_engine::{Event, MachineSnapshot, StepResult, SubstepState};

/// Variable set once a run reaches COMPLETE
pub const COMPLETED_VAR: &str = "completed";
/// Variable set once a run reaches STOPPED
pub const STOPPED_VAR: &str = "stopped";
/// Message carried by the final COMPLETE/STOP
pub const MESSAGE_VAR: &str = "message";

/// Lifecycle of an agent bound to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    Running,
    Done,
    Stopped,
}

/// Link between an agent and the step (or child workflow) it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBinding {
    pub step_id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_workflow_id: Option<String>,
    pub status: BindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
}

impl AgentBinding {
    pub fn running(step_id: StepId) -> Self {
        Self {
            step_id,
            child_workflow_id: None,
            status: BindingStatus::Running,
            result: None,
        }
    }
}

/// Change applied by `update_agent_binding`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingUpdate {
    /// Agent finished with a result
    Done(StepResult),
    /// Agent was stopped before reporting
    Stopped,
    /// Agent started a child workflow
    Child(String),
}

/// A step dispatched before the claiming agent is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingStep {
    pub step_id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
}

/// Last event fed to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunAction {
    Pass,
    Fail,
    Goto,
}

impl From<&Event> for RunAction {
    fn from(event: &Event) -> Self {
        match event {
            Event::Pass => RunAction::Pass,
            Event::Fail => RunAction::Fail,
            Event::Goto(_) => RunAction::Goto,
        }
    }
}

/// Options for creating a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Stack to push the run onto; the default stack when absent
    pub agent_id: Option<String>,
    pub parent_workflow_id: Option<String>,
    pub parent_step_id: Option<StepId>,
    /// Run was started from a prompt step
    pub prompted: bool,
}

/// Durable state of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    pub workflow_path: PathBuf,
    pub step: StepRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substep: Option<SubstepRef>,
    /// Dynamic-step counter, set while inside `{N}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<u32>,
    pub retry_count: u32,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substep_states: Vec<SubstepState>,
    #[serde(default)]
    pub pending_steps: Vec<PendingStep>,
    #[serde(default)]
    pub agent_bindings: BTreeMap<String, AgentBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_step_id: Option<StepId>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub prompted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<RunAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<MachineSnapshot>,
}

impl WorkflowState {
    /// Current position as a step id
    pub fn step_id(&self) -> StepId {
        StepId::new(self.step.clone(), self.substep.clone()).unwrap_or_else(StepId::next)
    }

    pub fn is_completed(&self) -> bool {
        self.flag(COMPLETED_VAR)
    }

    pub fn is_stopped(&self) -> bool {
        self.flag(STOPPED_VAR)
    }

    /// Outcome as seen by a parent: pass, fail, or still running
    pub fn outcome(&self) -> Option<StepResult> {
        if self.is_completed() {
            Some(StepResult::Pass)
        } else if self.is_stopped() {
            Some(StepResult::Fail)
        } else {
            None
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.variables.get(MESSAGE_VAR).and_then(Value::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.variables
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Process-wide stacks of in-progress runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub stacks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub default_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stashed_workflow_id: Option<String>,
}

impl Session {
    /// Stack for `agent_id`, or the default stack
    pub fn stack(&self, agent_id: Option<&str>) -> &[String] {
        match agent_id {
            Some(agent) => self.stacks.get(agent).map(Vec::as_slice).unwrap_or_default(),
            None => &self.default_stack,
        }
    }

    pub fn stack_mut(&mut self, agent_id: Option<&str>) -> &mut Vec<String> {
        match agent_id {
            Some(agent) => self.stacks.entry(agent.to_string()).or_default(),
            None => &mut self.default_stack,
        }
    }

    pub fn top(&self, agent_id: Option<&str>) -> Option<&String> {
        self.stack(agent_id).last()
    }

    pub fn push(&mut self, agent_id: Option<&str>, id: String) {
        self.stack_mut(agent_id).push(id);
    }

    pub fn pop(&mut self, agent_id: Option<&str>) -> Option<String> {
        let popped = self.stack_mut(agent_id).pop();
        self.prune();
        popped
    }

    /// Drop every reference to run `id`
    pub fn forget(&mut self, id: &str) {
        self.default_stack.retain(|entry| entry != id);
        for stack in self.stacks.values_mut() {
            stack.retain(|entry| entry != id);
        }
        if self.stashed_workflow_id.as_deref() == Some(id) {
            self.stashed_workflow_id = None;
        }
        self.prune();
    }

    fn prune(&mut self) {
        self.stacks.retain(|_, stack| !stack.is_empty());
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
