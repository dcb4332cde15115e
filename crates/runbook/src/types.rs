// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed runbook model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stepwise_core::{StepId, StepRef, SubstepRef, Transitions};

/// A shell snippet from a `bash`/`sh`/`shell` fence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub code: String,
}

impl Command {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// A `### <parent>.<id>` section inside a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substep {
    pub id: SubstepRef,
    pub description: String,
    /// Agent type named by the `(agent-type)` suffix on the header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    pub is_dynamic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Transitions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_runbooks: Vec<PathBuf>,
}

impl Substep {
    pub fn new(id: SubstepRef, description: impl Into<String>) -> Self {
        Self {
            is_dynamic: id.is_dynamic(),
            id,
            description: description.into(),
            agent_type: None,
            command: None,
            prompt: None,
            transitions: None,
            child_runbooks: Vec::new(),
        }
    }
}

/// A `## <id>` section of a runbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: StepRef,
    pub is_dynamic: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Transitions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substeps: Vec<Substep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_runbooks: Vec<PathBuf>,
}

impl Step {
    pub fn new(name: StepRef, description: impl Into<String>) -> Self {
        Self {
            is_dynamic: name.is_dynamic(),
            name,
            description: description.into(),
            command: None,
            prompt: None,
            transitions: None,
            substeps: Vec::new(),
            child_runbooks: Vec::new(),
        }
    }

    /// Reference to this step as a GOTO target
    pub fn id(&self) -> StepId {
        StepId::step(self.name.clone())
    }

    pub fn get_substep(&self, id: &SubstepRef) -> Option<&Substep> {
        self.substeps.iter().find(|s| &s.id == id)
    }

    pub fn first_substep(&self) -> Option<&Substep> {
        self.substeps.first()
    }
}

/// Something that may declare PASS/FAIL transitions
pub trait HasTransitions {
    fn transitions(&self) -> Option<&Transitions>;
}

impl HasTransitions for Step {
    fn transitions(&self) -> Option<&Transitions> {
        self.transitions.as_ref()
    }
}

impl HasTransitions for Substep {
    fn transitions(&self) -> Option<&Transitions> {
        self.transitions.as_ref()
    }
}

impl HasTransitions for Transitions {
    fn transitions(&self) -> Option<&Transitions> {
        Some(self)
    }
}

impl HasTransitions for Option<Transitions> {
    fn transitions(&self) -> Option<&Transitions> {
        self.as_ref()
    }
}

/// Parser output: a whole runbook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn get_step(&self, name: &StepRef) -> Option<&Step> {
        self.steps.iter().find(|s| &s.name == name)
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    /// The `{N}` step, if the runbook has one
    pub fn dynamic_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_dynamic)
    }
}
