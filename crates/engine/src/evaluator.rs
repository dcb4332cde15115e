// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-effect-free transition decisions
//!
//! These mirror what the compiled machine does so orchestration code can
//! reason about an outcome without driving an actor.

use serde::{Deserialize, Serialize};
use stepwise_core::{Action, NonRetryAction, StepId, SubstepRef};
use stepwise_runbook::HasTransitions;

const NO_FAIL_CONDITION: &str = "No FAIL condition defined for step";

/// What a PASS or FAIL leads to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConditionResult {
    Continue,
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Stopped {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Goto {
        target: StepId,
    },
    Retry {
        new_retry_count: u32,
    },
}

impl ConditionResult {
    pub fn goto_target(&self) -> Option<&StepId> {
        match self {
            ConditionResult::Goto { target } => Some(target),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ConditionResult::Complete { message } | ConditionResult::Stopped { message } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

/// Reported outcome of a step, substep or child workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepResult {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstepStatus {
    #[default]
    Pending,
    Running,
    Done,
}

/// Progress of one substep within the current step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstepState {
    pub id: SubstepRef,
    pub status: SubstepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
}

impl SubstepState {
    pub fn pending(id: SubstepRef) -> Self {
        Self {
            id,
            status: SubstepStatus::Pending,
            agent_id: None,
            result: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == SubstepStatus::Done
    }
}

fn from_non_retry(action: &NonRetryAction) -> ConditionResult {
    match action {
        NonRetryAction::Continue => ConditionResult::Continue,
        NonRetryAction::Complete { message } => ConditionResult::Complete {
            message: message.clone(),
        },
        NonRetryAction::Stop { message } => ConditionResult::Stopped {
            message: message.clone(),
        },
        NonRetryAction::Goto { target } => ConditionResult::Goto {
            target: target.clone(),
        },
    }
}

/// Outcome of a PASS; `RETRY` on the pass side just continues
pub fn evaluate_pass<T: HasTransitions + ?Sized>(item: &T) -> ConditionResult {
    match item.transitions().map(|t| &t.pass.action) {
        None | Some(Action::Retry { .. }) => ConditionResult::Continue,
        Some(Action::NonRetry(action)) => from_non_retry(action),
    }
}

/// Outcome of a FAIL after `retry_count` earlier retries
pub fn evaluate_fail<T: HasTransitions + ?Sized>(item: &T, retry_count: u32) -> ConditionResult {
    let Some(transitions) = item.transitions() else {
        return ConditionResult::Stopped {
            message: Some(NO_FAIL_CONDITION.to_string()),
        };
    };
    match &transitions.fail.action {
        Action::NonRetry(action) => from_non_retry(action),
        Action::Retry { max, then } => {
            let attempt = retry_count.saturating_add(1);
            if attempt > *max {
                from_non_retry(then)
            } else {
                ConditionResult::Retry {
                    new_retry_count: attempt,
                }
            }
        }
    }
}

/// Combine finished substeps into the parent's outcome
///
/// Returns `None` while any substep is unfinished (or there are none).
/// ALL mode fails on any failure; ANY mode passes on any pass.
pub fn evaluate_substep_aggregation<T: HasTransitions + ?Sized>(
    states: &[SubstepState],
    item: &T,
) -> Option<ConditionResult> {
    if states.is_empty() || !states.iter().all(SubstepState::is_done) {
        return None;
    }

    let all = item.transitions().map_or(true, |t| t.all);
    let passed = if all {
        !states.iter().any(|s| s.result == Some(StepResult::Fail))
    } else {
        states.iter().any(|s| s.result == Some(StepResult::Pass))
    };

    Some(if passed {
        evaluate_pass(item)
    } else {
        evaluate_fail(item, 0)
    })
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
