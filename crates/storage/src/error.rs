// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalogued execution-state errors.
//!
//! Every failure carries:
//! - A stable code for machines (`E_NOT_FOUND`, ...)
//! - A short human title
//! - Context fields describing what was involved
//!
//! [`StateError::report`] turns one into an [`ErrorReport`] with recovery
//! suggestions for display.

use std::fmt;
use std::path::PathBuf;
use stepwise_core::StepId;
use thiserror::Error;

/// Errors raised by the execution-state manager
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state directory {path} is not accessible: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no state directory: neither XDG_STATE_HOME nor HOME is set")]
    NoStateDir,
    #[error("workflow '{id}' not found")]
    NotFound { id: String },
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no active workflow{}", agent_suffix(.agent_id))]
    NoActiveWorkflow { agent_id: Option<String> },
    #[error("GOTO target '{target}' does not exist in workflow '{workflow_id}'")]
    GotoUnresolved { workflow_id: String, target: StepId },
    #[error("invalid step sequence: {details}")]
    StepSequence { details: String },
    #[error("failed to initialize state machine: {message}")]
    EngineInit { message: String },
    #[error("workflow '{stashed}' is already stashed")]
    StashOccupied { stashed: String },
    #[error("nothing is stashed")]
    NothingStashed,
    #[error("no agent '{agent_id}' bound in workflow '{workflow_id}'")]
    BindingNotFound {
        workflow_id: String,
        agent_id: String,
    },
    #[error("substep '{substep}' is not tracked in workflow '{workflow_id}'")]
    SubstepNotFound {
        workflow_id: String,
        substep: String,
    },
}

fn agent_suffix(agent_id: &Option<String>) -> String {
    match agent_id {
        Some(agent) => format!(" for agent '{}'", agent),
        None => String::new(),
    }
}

impl StateError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            StateError::StateDir { .. } | StateError::NoStateDir => "E_STATE_DIR",
            StateError::NotFound { .. } => "E_NOT_FOUND",
            StateError::Read { .. } => "E_STATE_READ",
            StateError::Write { .. } => "E_STATE_WRITE",
            StateError::Lock { .. } => "E_STATE_LOCK",
            StateError::NoActiveWorkflow { .. } => "E_NO_ACTIVE_WORKFLOW",
            StateError::GotoUnresolved { .. } => "E_GOTO_UNRESOLVED",
            StateError::StepSequence { .. } => "E_STEP_SEQUENCE",
            StateError::EngineInit { .. } => "E_ENGINE_INIT",
            StateError::StashOccupied { .. } => "E_STASH_OCCUPIED",
            StateError::NothingStashed => "E_NOTHING_STASHED",
            StateError::BindingNotFound { .. } => "E_BINDING_NOT_FOUND",
            StateError::SubstepNotFound { .. } => "E_SUBSTEP_NOT_FOUND",
        }
    }

    /// Short human title
    pub fn title(&self) -> &'static str {
        match self {
            StateError::StateDir { .. } | StateError::NoStateDir => "State directory unavailable",
            StateError::NotFound { .. } => "Workflow not found",
            StateError::Read { .. } => "Cannot read state",
            StateError::Write { .. } => "Cannot write state",
            StateError::Lock { .. } => "Cannot lock state",
            StateError::NoActiveWorkflow { .. } => "No active workflow",
            StateError::GotoUnresolved { .. } => "Unknown GOTO target",
            StateError::StepSequence { .. } => "Invalid step sequence",
            StateError::EngineInit { .. } => "State machine failed to start",
            StateError::StashOccupied { .. } => "Stash occupied",
            StateError::NothingStashed => "Nothing stashed",
            StateError::BindingNotFound { .. } => "Agent not bound",
            StateError::SubstepNotFound { .. } => "Substep not tracked",
        }
    }

    /// Machine context fields
    pub fn context(&self) -> Vec<(&'static str, String)> {
        match self {
            StateError::StateDir { path, .. }
            | StateError::Read { path, .. }
            | StateError::Write { path, .. }
            | StateError::Lock { path, .. } => vec![("path", path.display().to_string())],
            StateError::NotFound { id } => vec![("workflow_id", id.clone())],
            StateError::NoActiveWorkflow { agent_id } => agent_id
                .iter()
                .map(|agent| ("agent_id", agent.clone()))
                .collect(),
            StateError::GotoUnresolved {
                workflow_id,
                target,
            } => vec![
                ("workflow_id", workflow_id.clone()),
                ("target", target.to_string()),
            ],
            StateError::StashOccupied { stashed } => vec![("stashed", stashed.clone())],
            StateError::BindingNotFound {
                workflow_id,
                agent_id,
            } => vec![
                ("workflow_id", workflow_id.clone()),
                ("agent_id", agent_id.clone()),
            ],
            StateError::SubstepNotFound {
                workflow_id,
                substep,
            } => vec![
                ("workflow_id", workflow_id.clone()),
                ("substep", substep.clone()),
            ],
            StateError::NoStateDir
            | StateError::StepSequence { .. }
            | StateError::EngineInit { .. }
            | StateError::NothingStashed => Vec::new(),
        }
    }

    /// Build a display report with recovery suggestions
    pub fn report(&self) -> ErrorReport {
        let mut report = ErrorReport::new(self.code(), self.title(), self.to_string());
        for (key, value) in self.context() {
            report = report.with_context(format!("{}: {}", key, value));
        }
        match self {
            StateError::StateDir { .. } | StateError::NoStateDir => report
                .with_suggestion("Set STEPWISE_STATE_DIR to a writable directory")
                .with_suggestion("Check permissions on the state directory"),
            StateError::NotFound { .. } => report
                .with_context("The workflow may have finished or been stopped")
                .with_suggestion("List persisted runs to find the right id"),
            StateError::Read { .. } => report
                .with_context("The state file is left untouched")
                .with_suggestion("Inspect the file for manual edits or truncation"),
            StateError::NoActiveWorkflow { .. } => {
                report.with_suggestion("Start a runbook before reporting a result")
            }
            StateError::GotoUnresolved { .. } => {
                report.with_suggestion("Check the step ids defined in the runbook")
            }
            StateError::StepSequence { .. } => {
                report.with_suggestion("Fix the runbook and start the run again")
            }
            StateError::StashOccupied { .. } => {
                report.with_suggestion("Pop the stashed workflow before stashing another")
            }
            StateError::BindingNotFound { .. } => {
                report.with_suggestion("Bind the agent to a step before updating it")
            }
            _ => report,
        }
    }
}

/// Error with context and recovery suggestions for user-friendly display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: &'static str,
    pub title: &'static str,
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl ErrorReport {
    pub fn new(code: &'static str, title: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            title,
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error[{}]: {}", self.code, self.title)?;
        writeln!(f, "  {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
