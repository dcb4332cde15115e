// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition actions
//!
//! After a step reports PASS or FAIL, one of five actions decides what runs
//! next. `RETRY` wraps a fallback that is itself restricted to the non-retry
//! actions, so `RETRY ... RETRY ...` cannot be represented.

use crate::step_id::StepId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every action except `RETRY`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NonRetryAction {
    Continue,
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Goto {
        target: StepId,
    },
}

/// What happens after a PASS or FAIL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    NonRetry(NonRetryAction),
    /// Stay on the step up to `max` more times, then fall back to `then`
    Retry { max: u32, then: NonRetryAction },
}

impl NonRetryAction {
    pub fn stop(message: impl Into<String>) -> Self {
        NonRetryAction::Stop {
            message: Some(message.into()),
        }
    }

    pub fn goto(target: StepId) -> Self {
        NonRetryAction::Goto { target }
    }

    /// The message attached to `COMPLETE`/`STOP`, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            NonRetryAction::Complete { message } | NonRetryAction::Stop { message } => {
                message.as_deref()
            }
            NonRetryAction::Continue | NonRetryAction::Goto { .. } => None,
        }
    }

    pub fn goto_target(&self) -> Option<&StepId> {
        match self {
            NonRetryAction::Goto { target } => Some(target),
            _ => None,
        }
    }
}

impl Action {
    pub const CONTINUE: Action = Action::NonRetry(NonRetryAction::Continue);

    pub fn complete() -> Self {
        Action::NonRetry(NonRetryAction::Complete { message: None })
    }

    pub fn stop() -> Self {
        Action::NonRetry(NonRetryAction::Stop { message: None })
    }

    pub fn stop_with(message: impl Into<String>) -> Self {
        Action::NonRetry(NonRetryAction::stop(message))
    }

    pub fn goto(target: StepId) -> Self {
        Action::NonRetry(NonRetryAction::goto(target))
    }

    pub fn retry(max: u32, then: NonRetryAction) -> Self {
        Action::Retry { max, then }
    }

    /// Every GOTO target this action can reach, including a retry fallback
    pub fn goto_target(&self) -> Option<&StepId> {
        match self {
            Action::NonRetry(action) | Action::Retry { then: action, .. } => action.goto_target(),
        }
    }
}

impl From<NonRetryAction> for Action {
    fn from(action: NonRetryAction) -> Self {
        Action::NonRetry(action)
    }
}

/// Which answer a transition line responds to
///
/// `YES`/`NO` are the prompt-step spellings of `PASS`/`FAIL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideKind {
    Pass,
    Fail,
    Yes,
    No,
}

impl SideKind {
    pub fn keyword(self) -> &'static str {
        match self {
            SideKind::Pass => "PASS",
            SideKind::Fail => "FAIL",
            SideKind::Yes => "YES",
            SideKind::No => "NO",
        }
    }

    /// Whether this kind sits on the success side
    pub fn is_positive(self) -> bool {
        matches!(self, SideKind::Pass | SideKind::Yes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSide {
    pub kind: SideKind,
    pub action: Action,
}

/// Declared PASS/FAIL behaviour for a step or substep
///
/// `all = true`: pass only if every substep passes, fail if any fails.
/// `all = false`: pass if any substep passes, fail only once all have failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transitions {
    pub all: bool,
    pub pass: TransitionSide,
    pub fail: TransitionSide,
}

impl Transitions {
    pub fn new(pass: Action, fail: Action) -> Self {
        Self {
            all: true,
            pass: TransitionSide {
                kind: SideKind::Pass,
                action: pass,
            },
            fail: TransitionSide {
                kind: SideKind::Fail,
                action: fail,
            },
        }
    }

    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }
}

impl Default for Transitions {
    /// `PASS: CONTINUE`, `FAIL: STOP`, ALL mode
    fn default() -> Self {
        Transitions::new(Action::CONTINUE, Action::stop())
    }
}

fn write_message(f: &mut fmt::Formatter<'_>, keyword: &str, message: Option<&str>) -> fmt::Result {
    f.write_str(keyword)?;
    if let Some(message) = message {
        write!(f, " \"{}\"", message.replace('\\', "\\\\").replace('"', "\\\""))?;
    }
    Ok(())
}

impl fmt::Display for NonRetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonRetryAction::Continue => f.write_str("CONTINUE"),
            NonRetryAction::Complete { message } => write_message(f, "COMPLETE", message.as_deref()),
            NonRetryAction::Stop { message } => write_message(f, "STOP", message.as_deref()),
            NonRetryAction::Goto { target } => write!(f, "GOTO {}", target),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NonRetry(action) => write!(f, "{}", action),
            Action::Retry { max, then } => write!(f, "RETRY {} {}", max, then),
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
