// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook state machine
//!
//! [`Machine::compile`] flattens a step list into one state per
//! (step, substep) pair in document order, plus the absorbing `COMPLETE`
//! and `STOPPED` states. Each state carries a PASS and a FAIL transition
//! list; the first entry whose guard holds is taken.

use crate::actor::MachineContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use stepwise_core::{Action, NonRetryAction, StepId, StepRef, SubstepRef, Transitions};
use stepwise_runbook::Step;
use thiserror::Error;

const COMPLETE: &str = "COMPLETE";
const STOPPED: &str = "STOPPED";

/// Errors that can occur while compiling a step list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("cannot compile a runbook with no steps")]
    Empty,
    #[error("GOTO target '{target}' in {from} does not resolve to a state")]
    UnresolvedTarget { target: String, from: String },
    #[error("GOTO NEXT in {from} but the runbook has no {{N}} step")]
    NoDynamicStep { from: String },
}

/// Identity of a machine state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    Step {
        step: StepRef,
        substep: Option<SubstepRef>,
    },
    Complete,
    Stopped,
}

impl StateKey {
    pub fn step(step: StepRef, substep: Option<SubstepRef>) -> Self {
        StateKey::Step { step, substep }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StateKey::Complete | StateKey::Stopped)
    }

    /// The step reference this state runs, if it is not terminal
    pub fn step_id(&self) -> Option<StepId> {
        match self {
            StateKey::Step { step, substep } => {
                // Only a `NEXT` step is refused a substep
                Some(StepId::new(step.clone(), substep.clone()).unwrap_or_else(StepId::next))
            }
            StateKey::Complete | StateKey::Stopped => None,
        }
    }

    /// State name: `step_1`, `step_2_1`, `step_{N}`, `COMPLETE`, `STOPPED`
    pub fn name(&self) -> String {
        match self {
            StateKey::Step {
                step,
                substep: Some(substep),
            } => format!("step_{}_{}", step, substep),
            StateKey::Step {
                step,
                substep: None,
            } => format!("step_{}", step),
            StateKey::Complete => COMPLETE.to_string(),
            StateKey::Stopped => STOPPED.to_string(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// Persisted as step-id text ("2.1") or the terminal keyword; step ids can
// never collide with the keywords since both are reserved words.
impl Serialize for StateKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.step_id() {
            Some(id) => serializer.collect_str(&id),
            None => serializer.serialize_str(&self.name()),
        }
    }
}

impl<'de> Deserialize<'de> for StateKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.as_str() {
            COMPLETE => Ok(StateKey::Complete),
            STOPPED => Ok(StateKey::Stopped),
            _ => match StepId::parse(&text) {
                Some(id) if !id.is_next() => {
                    let (step, substep) = id.into_parts();
                    Ok(StateKey::step(step, substep))
                }
                _ => Err(serde::de::Error::custom(format!(
                    "invalid machine state '{}'",
                    text
                ))),
            },
        }
    }
}

/// Input to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Pass,
    Fail,
    /// Out-of-band jump, preferred over declared transitions
    Goto(StepId),
}

/// Condition checked before a transition is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    /// `retry_count < max`
    RetriesRemaining(u32),
}

impl Guard {
    fn allows(self, context: &MachineContext) -> bool {
        match self {
            Guard::Always => true,
            Guard::RetriesRemaining(max) => context.retry_count < max,
        }
    }
}

/// Context mutation applied when a transition is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOp {
    ResetRetry,
    IncrementRetry,
    /// Tell the host to start a new instance of the dynamic step
    RaiseNextInstance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub guard: Guard,
    pub target: StateKey,
    pub ops: Vec<ContextOp>,
    /// STOP/COMPLETE message carried into the terminal state
    pub message: Option<String>,
}

impl Transition {
    fn to(target: StateKey, ops: Vec<ContextOp>) -> Self {
        Self {
            guard: Guard::Always,
            target,
            ops,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateNode {
    pub key: StateKey,
    pub on_pass: Vec<Transition>,
    pub on_fail: Vec<Transition>,
}

/// A compiled runbook
#[derive(Debug, Clone)]
pub struct Machine {
    nodes: Vec<StateNode>,
    index: HashMap<StateKey, usize>,
    /// First state of each step, by step reference
    step_entry: HashMap<StepRef, StateKey>,
    dynamic_entry: Option<StateKey>,
}

impl Machine {
    /// Compile a validated step list
    pub fn compile(steps: &[Step]) -> Result<Self, CompileError> {
        let keys = state_keys(steps);
        if keys.is_empty() {
            return Err(CompileError::Empty);
        }

        let index = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();
        let step_entry: HashMap<StepRef, StateKey> = steps
            .iter()
            .filter_map(|step| {
                let first = keys.iter().find(|key| match key {
                    StateKey::Step { step: s, .. } => s == &step.name,
                    _ => false,
                })?;
                Some((step.name.clone(), first.clone()))
            })
            .collect();
        let dynamic_entry = steps
            .iter()
            .find(|s| s.is_dynamic)
            .and_then(|s| step_entry.get(&s.name).cloned());

        let mut machine = Machine {
            nodes: Vec::with_capacity(keys.len()),
            index,
            step_entry,
            dynamic_entry,
        };

        let mut position = 0;
        for step in steps {
            if step.substeps.is_empty() {
                let handlers = Handlers::of(step.transitions.as_ref());
                let node = machine.compile_node(&keys, position, handlers)?;
                machine.nodes.push(node);
                position += 1;
                continue;
            }

            let parent = Handlers::of(step.transitions.as_ref());
            let last = step.substeps.len() - 1;
            for (i, substep) in step.substeps.iter().enumerate() {
                let handlers = match &substep.transitions {
                    Some(own) => Handlers::of(Some(own)),
                    None => Handlers {
                        pass: if i == last {
                            parent.pass.clone()
                        } else {
                            Action::CONTINUE
                        },
                        fail: parent.fail.clone(),
                    },
                };
                let node = machine.compile_node(&keys, position, handlers)?;
                machine.nodes.push(node);
                position += 1;
            }
        }

        tracing::debug!(
            states = machine.nodes.len(),
            initial = %machine.initial_state(),
            "compiled runbook"
        );
        Ok(machine)
    }

    /// The state a new run starts in
    pub fn initial_state(&self) -> &StateKey {
        // compile() rejects empty step lists
        &self.nodes[0].key
    }

    /// Every non-terminal state, in document order
    pub fn states(&self) -> impl Iterator<Item = &StateKey> {
        self.nodes.iter().map(|n| &n.key)
    }

    pub fn node(&self, key: &StateKey) -> Option<&StateNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Whether `key` is a state of this machine (terminal states included)
    pub fn contains(&self, key: &StateKey) -> bool {
        key.is_terminal() || self.index.contains_key(key)
    }

    /// Resolve a GOTO target to the state it enters
    ///
    /// A step without a substep enters the step's first state. `NEXT` and
    /// `{N}` enter the dynamic step.
    pub fn resolve(&self, target: &StepId) -> Option<StateKey> {
        let step = match target.step_ref() {
            StepRef::Next => return self.dynamic_entry.clone(),
            StepRef::Dynamic => match &self.dynamic_entry {
                Some(StateKey::Step { step, .. }) => step.clone(),
                _ => return None,
            },
            other => other.clone(),
        };
        match target.substep_ref() {
            None => self.step_entry.get(&step).cloned(),
            Some(substep) => {
                let key = StateKey::step(step, Some(substep.clone()));
                self.index.contains_key(&key).then_some(key)
            }
        }
    }

    /// Pick the transition `event` takes from `state`, if any
    ///
    /// Terminal states absorb every event. An unresolvable out-of-band
    /// GOTO is ignored.
    pub fn select(
        &self,
        state: &StateKey,
        context: &MachineContext,
        event: &Event,
    ) -> Option<Transition> {
        if state.is_terminal() {
            return None;
        }
        let node = self.node(state)?;
        match event {
            Event::Pass => first_allowed(&node.on_pass, context),
            Event::Fail => first_allowed(&node.on_fail, context),
            Event::Goto(target) => {
                let key = self.resolve(target)?;
                let mut ops = vec![ContextOp::ResetRetry];
                if target.is_next() {
                    ops.push(ContextOp::RaiseNextInstance);
                }
                Some(Transition::to(key, ops))
            }
        }
    }

    fn compile_node(
        &self,
        keys: &[StateKey],
        position: usize,
        handlers: Handlers,
    ) -> Result<StateNode, CompileError> {
        let key = keys[position].clone();
        let next = keys.get(position + 1).cloned().unwrap_or(StateKey::Complete);
        let from = |side: &str| format!("{} {}", key, side);

        let on_pass = self.compile_action(&key, &next, &handlers.pass, &from("PASS"))?;
        let on_fail = self.compile_action(&key, &next, &handlers.fail, &from("FAIL"))?;
        Ok(StateNode {
            key,
            on_pass,
            on_fail,
        })
    }

    fn compile_action(
        &self,
        current: &StateKey,
        next: &StateKey,
        action: &Action,
        from: &str,
    ) -> Result<Vec<Transition>, CompileError> {
        match action {
            Action::NonRetry(action) => Ok(vec![self.compile_non_retry(current, next, action, from)?]),
            Action::Retry { max, then } => Ok(vec![
                Transition {
                    guard: Guard::RetriesRemaining(*max),
                    target: current.clone(),
                    ops: vec![ContextOp::IncrementRetry],
                    message: None,
                },
                self.compile_non_retry(current, next, then, from)?,
            ]),
        }
    }

    fn compile_non_retry(
        &self,
        current: &StateKey,
        next: &StateKey,
        action: &NonRetryAction,
        from: &str,
    ) -> Result<Transition, CompileError> {
        match action {
            NonRetryAction::Continue => Ok(Transition::to(next.clone(), vec![ContextOp::ResetRetry])),
            NonRetryAction::Complete { message } => Ok(Transition {
                message: message.clone(),
                ..Transition::to(StateKey::Complete, Vec::new())
            }),
            NonRetryAction::Stop { message } => Ok(Transition {
                message: message.clone(),
                ..Transition::to(StateKey::Stopped, Vec::new())
            }),
            NonRetryAction::Goto { target } if target.is_next() => {
                let entry = self
                    .dynamic_entry
                    .clone()
                    .ok_or_else(|| CompileError::NoDynamicStep {
                        from: from.to_string(),
                    })?;
                Ok(Transition::to(
                    entry,
                    vec![ContextOp::ResetRetry, ContextOp::RaiseNextInstance],
                ))
            }
            NonRetryAction::Goto { target } => {
                let key = self
                    .resolve(target)
                    .ok_or_else(|| CompileError::UnresolvedTarget {
                        target: target.to_string(),
                        from: from.to_string(),
                    })?;
                // Jumping to the current state is an implicit retry
                let op = if &key == current {
                    ContextOp::IncrementRetry
                } else {
                    ContextOp::ResetRetry
                };
                Ok(Transition::to(key, vec![op]))
            }
        }
    }
}

struct Handlers {
    pass: Action,
    fail: Action,
}

impl Handlers {
    fn of(transitions: Option<&Transitions>) -> Self {
        let transitions = transitions.cloned().unwrap_or_default();
        Self {
            pass: transitions.pass.action,
            fail: transitions.fail.action,
        }
    }
}

fn state_keys(steps: &[Step]) -> Vec<StateKey> {
    steps
        .iter()
        .flat_map(|step| {
            if step.substeps.is_empty() {
                vec![StateKey::step(step.name.clone(), None)]
            } else {
                step.substeps
                    .iter()
                    .map(|s| StateKey::step(step.name.clone(), Some(s.id.clone())))
                    .collect()
            }
        })
        .collect()
}

fn first_allowed(transitions: &[Transition], context: &MachineContext) -> Option<Transition> {
    transitions
        .iter()
        .find(|t| t.guard.allows(context))
        .cloned()
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
