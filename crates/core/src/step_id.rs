// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step and substep references
//!
//! A `StepId` names a position in a runbook: `3`, `2.1`, `deploy.verify`,
//! the dynamic sentinels `{N}` / `{N}.{n}`, or the `NEXT` keyword used by
//! `GOTO NEXT`. Dynamic sentinels are explicit enum variants rather than magic
//! strings, so they compare as tokens and never collide with a step name.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Largest step or substep number accepted by the parser
pub const MAX_STEP_NUMBER: u32 = 9999;

/// Keywords that can never be used as step or substep names
pub const RESERVED_WORDS: [&str; 12] = [
    "NEXT", "CONTINUE", "COMPLETE", "STOP", "GOTO", "RETRY", "PASS", "FAIL", "YES", "NO", "ALL",
    "ANY",
];

const DYNAMIC_STEP: &str = "{N}";
const DYNAMIC_SUBSTEP: &str = "{n}";
const NEXT: &str = "NEXT";

// Identifier pattern for named steps - this is a constant valid pattern
#[allow(clippy::expect_used)]
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("constant regex pattern is valid")
});

/// Why a step reference was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepIdError {
    #[error("empty step reference")]
    Empty,
    #[error("NEXT cannot carry a substep: '{0}'")]
    NextWithSubstep(String),
    #[error("step numbers must be between 1 and {MAX_STEP_NUMBER}: '{0}'")]
    OutOfRange(String),
    #[error("'{0}' is a reserved word")]
    Reserved(String),
    #[error("invalid step reference '{0}'")]
    Invalid(String),
}

/// The step half of a reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepRef {
    Numeric(u32),
    Named(String),
    /// `{N}`: the current instance of the dynamic step
    Dynamic,
    /// `NEXT`: start a fresh instance of the dynamic step
    Next,
}

/// The substep half of a reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubstepRef {
    Numeric(u32),
    Named(String),
    /// `{n}`: a repeatable substep
    Dynamic,
}

/// A reference to a step, optionally narrowed to one of its substeps
///
/// Construct through [`StepId::parse`] or the constructors; `Next` never
/// carries a substep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId {
    step: StepRef,
    substep: Option<SubstepRef>,
}

impl StepRef {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, StepRef::Dynamic)
    }

    fn parse_part(text: &str) -> Result<Self, StepIdError> {
        match text {
            "" => Err(StepIdError::Empty),
            DYNAMIC_STEP => Ok(StepRef::Dynamic),
            NEXT => Ok(StepRef::Next),
            _ => match parse_component(text)? {
                Component::Numeric(n) => Ok(StepRef::Numeric(n)),
                Component::Named(name) => Ok(StepRef::Named(name)),
            },
        }
    }
}

impl SubstepRef {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, SubstepRef::Dynamic)
    }

    fn parse_part(text: &str) -> Result<Self, StepIdError> {
        match text {
            "" => Err(StepIdError::Empty),
            DYNAMIC_SUBSTEP => Ok(SubstepRef::Dynamic),
            _ => match parse_component(text)? {
                Component::Numeric(n) => Ok(SubstepRef::Numeric(n)),
                Component::Named(name) => Ok(SubstepRef::Named(name)),
            },
        }
    }
}

enum Component {
    Numeric(u32),
    Named(String),
}

fn parse_component(text: &str) -> Result<Component, StepIdError> {
    if text.chars().all(|c| c.is_ascii_digit()) {
        return match text.parse::<u32>() {
            Ok(n) if (1..=MAX_STEP_NUMBER).contains(&n) => Ok(Component::Numeric(n)),
            _ => Err(StepIdError::OutOfRange(text.to_string())),
        };
    }
    if !NAME_PATTERN.is_match(text) {
        return Err(StepIdError::Invalid(text.to_string()));
    }
    if is_reserved(text) {
        return Err(StepIdError::Reserved(text.to_string()));
    }
    Ok(Component::Named(text.to_string()))
}

/// Whether `word` is one of the DSL keywords (case-insensitive)
pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(word))
}

/// Whether `word` is usable as a step or substep name
pub fn is_valid_name(word: &str) -> bool {
    NAME_PATTERN.is_match(word) && !is_reserved(word)
}

impl StepId {
    /// Reference a whole step
    pub fn step(step: StepRef) -> Self {
        Self {
            step,
            substep: None,
        }
    }

    /// Reference a substep; returns `None` for `NEXT`, which cannot carry one
    pub fn substep(step: StepRef, substep: SubstepRef) -> Option<Self> {
        if step == StepRef::Next {
            return None;
        }
        Some(Self {
            step,
            substep: Some(substep),
        })
    }

    /// Combine both halves; `None` if `NEXT` would carry a substep
    pub fn new(step: StepRef, substep: Option<SubstepRef>) -> Option<Self> {
        match substep {
            Some(substep) => Self::substep(step, substep),
            None => Some(Self::step(step)),
        }
    }

    pub fn numeric(step: u32) -> Self {
        Self::step(StepRef::Numeric(step))
    }

    pub fn next() -> Self {
        Self::step(StepRef::Next)
    }

    /// Parse DSL text, returning `None` for anything invalid
    ///
    /// `"3"`, `"2.1"`, `"{N}"`, `"{N}.{n}"`, `"NEXT"` and `"deploy.check"` are
    /// accepted; `"NEXT.1"`, `"3.0"`, `"{N}.0"` and `"-1"` are not.
    pub fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    pub fn step_ref(&self) -> &StepRef {
        &self.step
    }

    pub fn substep_ref(&self) -> Option<&SubstepRef> {
        self.substep.as_ref()
    }

    pub fn into_parts(self) -> (StepRef, Option<SubstepRef>) {
        (self.step, self.substep)
    }

    pub fn is_next(&self) -> bool {
        self.step == StepRef::Next
    }

    /// Whether either half is a dynamic sentinel
    pub fn is_dynamic(&self) -> bool {
        self.step.is_dynamic() || self.substep.as_ref().is_some_and(SubstepRef::is_dynamic)
    }
}

impl FromStr for StepId {
    type Err = StepIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (step_part, substep_part) = match text.split_once('.') {
            Some((step, substep)) => (step, Some(substep)),
            None => (text, None),
        };

        let step = StepRef::parse_part(step_part)?;
        let substep = match substep_part {
            None => None,
            Some(_) if step == StepRef::Next => {
                return Err(StepIdError::NextWithSubstep(text.to_string()))
            }
            Some(part) => Some(SubstepRef::parse_part(part)?),
        };
        Ok(StepId { step, substep })
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepRef::Numeric(n) => write!(f, "{}", n),
            StepRef::Named(name) => f.write_str(name),
            StepRef::Dynamic => f.write_str(DYNAMIC_STEP),
            StepRef::Next => f.write_str(NEXT),
        }
    }
}

impl fmt::Display for SubstepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstepRef::Numeric(n) => write!(f, "{}", n),
            SubstepRef::Named(name) => f.write_str(name),
            SubstepRef::Dynamic => f.write_str(DYNAMIC_SUBSTEP),
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.substep {
            Some(substep) => write!(f, "{}.{}", self.step, substep),
            None => write!(f, "{}", self.step),
        }
    }
}

impl FromStr for StepRef {
    type Err = StepIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        StepRef::parse_part(text.trim())
    }
}

impl FromStr for SubstepRef {
    type Err = StepIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        SubstepRef::parse_part(text.trim())
    }
}

// Persisted state stores references in their DSL text form.
macro_rules! serde_as_text {
    ($ty:ty, $what:literal) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(|e: StepIdError| {
                    serde::de::Error::custom(format!("invalid {}: {}", $what, e))
                })
            }
        }
    };
}

serde_as_text!(StepId, "step id");
serde_as_text!(StepRef, "step reference");
serde_as_text!(SubstepRef, "substep reference");

#[cfg(test)]
#[path = "step_id_tests.rs"]
mod tests;
