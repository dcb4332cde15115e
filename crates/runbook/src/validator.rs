// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation for parsed runbooks.
//!
//! Validation never fails fast: every problem is collected so authors see
//! the whole list at once.
//! - Numeric steps and substeps count up from 1 without gaps
//! - Ids are unique and there is at most one `{N}` step
//! - GOTO targets exist and are unambiguous
//! - `GOTO NEXT` only appears inside the dynamic step

use crate::types::{Step, Substep};
use std::collections::HashSet;
use std::fmt;
use stepwise_core::{SideKind, StepId, StepRef, SubstepRef, Transitions};

/// Collection of validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Runbook validation failed with {} error(s):",
            self.errors.len()
        )?;
        for (i, error) in self.errors.iter().enumerate() {
            match error.line() {
                Some(line) => writeln!(f, "  {}: line {}: {}", i + 1, line, error)?,
                None => writeln!(f, "  {}: {}", i + 1, error)?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A single validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No steps at all
    EmptyWorkflow,
    /// Numeric steps must run 1, 2, 3, ...
    NonSequentialStep { expected: u32, found: u32 },
    /// Numeric substeps must run 1, 2, 3, ... within their step
    NonSequentialSubstep {
        step: String,
        expected: u32,
        found: u32,
    },
    DuplicateStep { step: String },
    DuplicateSubstep { step: String, substep: String },
    /// More than one `{N}` step
    MultipleDynamicSteps { count: usize },
    /// GOTO to a step or substep that does not exist
    UndefinedTarget {
        target: String,
        referenced_in: String,
    },
    /// Plain GOTO into another step whose substeps are all `{n}`
    AmbiguousTarget {
        target: String,
        referenced_in: String,
    },
    /// `GOTO NEXT` used outside the dynamic step
    NextOutsideDynamic { referenced_in: String },
    /// Only one side of a PASS/FAIL pair was declared
    MissingTransitionSide {
        location: String,
        side: SideKind,
        line: usize,
    },
}

impl ValidationError {
    /// Source line, when the error came from the parser
    pub fn line(&self) -> Option<usize> {
        match self {
            ValidationError::MissingTransitionSide { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyWorkflow => write!(f, "runbook defines no steps"),
            ValidationError::NonSequentialStep { expected, found } => {
                write!(f, "expected step {} but found step {}", expected, found)
            }
            ValidationError::NonSequentialSubstep {
                step,
                expected,
                found,
            } => write!(
                f,
                "expected substep {}.{} but found {}.{}",
                step, expected, step, found
            ),
            ValidationError::DuplicateStep { step } => write!(f, "step {} is defined twice", step),
            ValidationError::DuplicateSubstep { step, substep } => {
                write!(f, "substep {}.{} is defined twice", step, substep)
            }
            ValidationError::MultipleDynamicSteps { count } => write!(
                f,
                "only one {{N}} step is allowed, found {}",
                count
            ),
            ValidationError::UndefinedTarget {
                target,
                referenced_in,
            } => write!(
                f,
                "GOTO target '{}' referenced in {} does not exist",
                target, referenced_in
            ),
            ValidationError::AmbiguousTarget {
                target,
                referenced_in,
            } => write!(
                f,
                "GOTO target '{}' referenced in {} is ambiguous: name a substep",
                target, referenced_in
            ),
            ValidationError::NextOutsideDynamic { referenced_in } => write!(
                f,
                "GOTO NEXT referenced in {} is only allowed inside the {{N}} step",
                referenced_in
            ),
            ValidationError::MissingTransitionSide { location, side, .. } => write!(
                f,
                "{} declares transitions but no {} line",
                location,
                side.keyword()
            ),
        }
    }
}

/// Check a parsed step list, returning every problem found
pub fn validate_steps(steps: &[Step]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if steps.is_empty() {
        errors.push(ValidationError::EmptyWorkflow);
        return errors;
    }

    check_step_sequence(steps, &mut errors);
    for step in steps {
        check_substep_sequence(step, &mut errors);
    }

    let dynamic = steps.iter().filter(|s| s.is_dynamic).count();
    if dynamic > 1 {
        errors.push(ValidationError::MultipleDynamicSteps { count: dynamic });
    }

    for step in steps {
        let location = format!("step {}", step.name);
        check_targets(steps, step, &location, step.transitions.as_ref(), &mut errors);
        for substep in &step.substeps {
            let location = substep_location(step, substep);
            check_targets(steps, step, &location, substep.transitions.as_ref(), &mut errors);
        }
    }

    errors
}

fn substep_location(step: &Step, substep: &Substep) -> String {
    format!("step {}.{}", step.name, substep.id)
}

fn check_step_sequence(steps: &[Step], errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut expected = 1;
    for step in steps {
        if !step.is_dynamic && !seen.insert(&step.name) {
            errors.push(ValidationError::DuplicateStep {
                step: step.name.to_string(),
            });
            continue;
        }
        if let StepRef::Numeric(found) = step.name {
            if found != expected {
                errors.push(ValidationError::NonSequentialStep { expected, found });
            }
            expected = found + 1;
        }
    }
}

fn check_substep_sequence(step: &Step, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut expected = 1;
    for substep in &step.substeps {
        if !seen.insert(&substep.id) {
            errors.push(ValidationError::DuplicateSubstep {
                step: step.name.to_string(),
                substep: substep.id.to_string(),
            });
            continue;
        }
        if let SubstepRef::Numeric(found) = substep.id {
            if found != expected {
                errors.push(ValidationError::NonSequentialSubstep {
                    step: step.name.to_string(),
                    expected,
                    found,
                });
            }
            expected = found + 1;
        }
    }
}

fn check_targets(
    steps: &[Step],
    owner: &Step,
    location: &str,
    transitions: Option<&Transitions>,
    errors: &mut Vec<ValidationError>,
) {
    let Some(transitions) = transitions else {
        return;
    };

    for side in [&transitions.pass, &transitions.fail] {
        let Some(target) = side.action.goto_target() else {
            continue;
        };
        let referenced_in = format!("{} {}", location, side.kind.keyword());
        if let Some(error) = check_target(steps, owner, target, referenced_in) {
            errors.push(error);
        }
    }
}

fn check_target(
    steps: &[Step],
    owner: &Step,
    target: &StepId,
    referenced_in: String,
) -> Option<ValidationError> {
    let undefined = |referenced_in: String| ValidationError::UndefinedTarget {
        target: target.to_string(),
        referenced_in,
    };

    let step = match target.step_ref() {
        StepRef::Next => {
            if !owner.is_dynamic {
                return Some(ValidationError::NextOutsideDynamic { referenced_in });
            }
            return None;
        }
        StepRef::Dynamic => steps.iter().find(|s| s.is_dynamic),
        name => steps.iter().find(|s| &s.name == name),
    };
    let Some(step) = step else {
        return Some(undefined(referenced_in));
    };

    match target.substep_ref() {
        Some(substep) => {
            if step.get_substep(substep).is_none() {
                return Some(undefined(referenced_in));
            }
        }
        None => {
            let dynamic_only =
                !step.substeps.is_empty() && step.substeps.iter().all(|s| s.is_dynamic);
            if dynamic_only && step.name != owner.name {
                return Some(ValidationError::AmbiguousTarget {
                    target: target.to_string(),
                    referenced_in,
                });
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
