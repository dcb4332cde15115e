// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-state manager
//!
//! Owns persisted runs and the shared session. A compiled machine is cheap
//! and disposable: every drive step rebuilds an actor from the run's
//! snapshot, feeds it one event and writes the result back.
//!
//! Each read-modify-write holds the store lock for its whole cycle. Reads
//! take no lock because writes replace files atomically.

use crate::config::StoreConfig;
use crate::error::StateError;
use crate::state::{
    AgentBinding, BindingStatus, BindingUpdate, CreateOptions, PendingStep, RunAction, Session,
    WorkflowState, COMPLETED_VAR, MESSAGE_VAR, STOPPED_VAR,
};
use crate::store::{self, StoreLock};
use serde_json::Value;
use std::path::Path;
use stepwise_core::{Clock, IdGen, StepId, StepRef, SubstepRef, SystemClock, UuidIdGen};
use stepwise_engine::{
    evaluate_substep_aggregation, ConditionResult, Event, Machine, MachineActor, MachineSnapshot,
    StateKey, StepResult, SubstepState, SubstepStatus,
};
use stepwise_runbook::{validate_steps, HasTransitions, Step, Workflow};
use tracing::{debug, info, warn};

/// Persists runs and drives their machines
#[derive(Debug, Clone)]
pub struct StateManager<C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    config: StoreConfig,
    clock: C,
    ids: I,
}

impl StateManager {
    /// Manager with the system clock and random ids
    pub fn new(config: StoreConfig) -> Self {
        Self::with_deps(config, SystemClock, UuidIdGen)
    }
}

impl<C: Clock, I: IdGen> StateManager<C, I> {
    pub fn with_deps(config: StoreConfig, clock: C, ids: I) -> Self {
        Self { config, clock, ids }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -- runs --------------------------------------------------------------

    /// Start a run of `workflow` and push it onto the caller's stack
    ///
    /// Fails before anything is written if the steps do not validate or
    /// compile.
    pub fn create(
        &self,
        workflow_path: &Path,
        workflow: &Workflow,
        options: CreateOptions,
    ) -> Result<WorkflowState, StateError> {
        let errors = validate_steps(&workflow.steps);
        if !errors.is_empty() {
            let details = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StateError::StepSequence { details });
        }
        let machine = compile(&workflow.steps)?;
        let snapshot = MachineSnapshot::at(machine.initial_state().clone());

        let now = self.clock.now();
        let mut state = WorkflowState {
            id: self.ids.next(),
            workflow_path: workflow_path.to_path_buf(),
            step: StepRef::Numeric(1),
            substep: None,
            instance: None,
            retry_count: 0,
            variables: Default::default(),
            substep_states: Vec::new(),
            pending_steps: Vec::new(),
            agent_bindings: Default::default(),
            parent_workflow_id: options.parent_workflow_id,
            parent_step_id: options.parent_step_id,
            started_at: now,
            updated_at: now,
            prompted: options.prompted,
            last_action: None,
            last_result: None,
            snapshot: None,
        };
        if let StateKey::Step { step, .. } = &snapshot.state {
            state.step = step.clone();
        }
        apply_snapshot(&mut state, snapshot, &workflow.steps);

        let _lock = self.lock()?;
        self.write_state(&state)?;
        let mut session = self.read_session()?;
        session.push(options.agent_id.as_deref(), state.id.clone());
        self.write_session(&session)?;

        info!(
            workflow_id = %state.id,
            path = %workflow_path.display(),
            agent_id = options.agent_id.as_deref(),
            step = %state.step_id(),
            "workflow created"
        );
        Ok(state)
    }

    pub fn load(&self, id: &str) -> Result<WorkflowState, StateError> {
        store::read_json(&self.config.run_path(id))?
            .ok_or_else(|| StateError::NotFound { id: id.to_string() })
    }

    /// Persist `state`, stamping `updated_at`
    pub fn save(&self, state: &mut WorkflowState) -> Result<(), StateError> {
        let _lock = self.lock()?;
        state.updated_at = self.clock.now();
        self.write_state(state)
    }

    /// Remove a run and every session reference to it
    pub fn delete(&self, id: &str) -> Result<(), StateError> {
        let _lock = self.lock()?;
        if !store::remove(&self.config.run_path(id))? {
            return Err(StateError::NotFound { id: id.to_string() });
        }
        let mut session = self.read_session()?;
        session.forget(id);
        self.write_session(&session)?;
        info!(workflow_id = id, "workflow deleted");
        Ok(())
    }

    /// Ids of every persisted run, sorted
    pub fn list(&self) -> Result<Vec<String>, StateError> {
        let entries = match std::fs::read_dir(&self.config.runs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StateError::StateDir {
                    path: self.config.runs_dir.clone(),
                    source,
                })
            }
        };

        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    // -- machine -----------------------------------------------------------

    /// Compile `steps` and hydrate an actor at the run's persisted position
    pub fn create_actor(&self, id: &str, steps: &[Step]) -> Result<MachineActor, StateError> {
        let state = self.load(id)?;
        hydrate(&state, compile(steps)?)
    }

    /// Copy the actor's position back into the persisted run
    pub fn update_from_actor(
        &self,
        id: &str,
        actor: &MachineActor,
        steps: &[Step],
    ) -> Result<WorkflowState, StateError> {
        self.modify(id, |state| {
            apply_snapshot(state, actor.snapshot(), steps);
            Ok(())
        })
    }

    /// Feed one event to the run's machine and persist the result
    pub fn send_event(
        &self,
        id: &str,
        steps: &[Step],
        event: Event,
    ) -> Result<WorkflowState, StateError> {
        let machine = compile(steps)?;
        self.modify(id, |state| {
            let mut actor = hydrate(state, machine)?;
            if let Event::Goto(target) = &event {
                if actor.machine().resolve(target).is_none() {
                    return Err(StateError::GotoUnresolved {
                        workflow_id: state.id.clone(),
                        target: target.clone(),
                    });
                }
            }

            let from = actor.state().clone();
            let to = actor.send(event.clone()).clone();
            debug!(workflow_id = %state.id, %from, %to, ?event, "event applied");

            state.last_action = Some(RunAction::from(&event));
            state.last_result = match event {
                Event::Pass => Some(StepResult::Pass),
                Event::Fail => Some(StepResult::Fail),
                Event::Goto(_) => None,
            };
            apply_snapshot(state, actor.snapshot(), steps);
            Ok(())
        })
    }

    /// Jump to `target`, failing if the runbook has no such step
    pub fn goto(
        &self,
        id: &str,
        steps: &[Step],
        target: &StepId,
    ) -> Result<WorkflowState, StateError> {
        self.send_event(id, steps, Event::Goto(target.clone()))
    }

    // -- stacks ------------------------------------------------------------

    pub fn push_workflow(&self, id: &str, agent_id: Option<&str>) -> Result<(), StateError> {
        self.modify_session(|session| {
            session.push(agent_id, id.to_string());
            Ok(())
        })?;
        info!(workflow_id = id, agent_id, "workflow pushed");
        Ok(())
    }

    pub fn pop_workflow(&self, agent_id: Option<&str>) -> Result<Option<String>, StateError> {
        let popped = self.modify_session(|session| Ok(session.pop(agent_id)))?;
        if let Some(id) = &popped {
            info!(workflow_id = %id, agent_id, "workflow popped");
        }
        Ok(popped)
    }

    /// Top of the agent's stack (or the default stack)
    pub fn active_workflow(&self, agent_id: Option<&str>) -> Result<Option<String>, StateError> {
        Ok(self.read_session()?.top(agent_id).cloned())
    }

    pub fn require_active(&self, agent_id: Option<&str>) -> Result<String, StateError> {
        self.active_workflow(agent_id)?
            .ok_or_else(|| StateError::NoActiveWorkflow {
                agent_id: agent_id.map(str::to_string),
            })
    }

    /// Move the top of a stack into the stash slot
    pub fn stash(&self, agent_id: Option<&str>) -> Result<String, StateError> {
        let id = self.modify_session(|session| {
            if let Some(stashed) = &session.stashed_workflow_id {
                return Err(StateError::StashOccupied {
                    stashed: stashed.clone(),
                });
            }
            let id = session
                .pop(agent_id)
                .ok_or_else(|| StateError::NoActiveWorkflow {
                    agent_id: agent_id.map(str::to_string),
                })?;
            session.stashed_workflow_id = Some(id.clone());
            Ok(id)
        })?;
        info!(workflow_id = %id, agent_id, "workflow stashed");
        Ok(id)
    }

    /// Move the stashed run back onto a stack
    pub fn pop_stashed(&self, agent_id: Option<&str>) -> Result<String, StateError> {
        let id = self.modify_session(|session| {
            let id = session
                .stashed_workflow_id
                .take()
                .ok_or(StateError::NothingStashed)?;
            session.push(agent_id, id.clone());
            Ok(id)
        })?;
        info!(workflow_id = %id, agent_id, "workflow restored from stash");
        Ok(id)
    }

    pub fn session(&self) -> Result<Session, StateError> {
        self.read_session()
    }

    // -- pending steps and agents ------------------------------------------

    pub fn push_pending_step(&self, id: &str, pending: PendingStep) -> Result<(), StateError> {
        self.modify(id, |state| {
            state.pending_steps.push(pending);
            Ok(())
        })
        .map(drop)
    }

    /// Oldest pending step, removed from the queue
    pub fn pop_pending_step(&self, id: &str) -> Result<Option<PendingStep>, StateError> {
        let mut popped = None;
        self.modify(id, |state| {
            if !state.pending_steps.is_empty() {
                popped = Some(state.pending_steps.remove(0));
            }
            Ok(())
        })?;
        Ok(popped)
    }

    /// Record that `agent_id` is now running `step_id`
    pub fn bind_agent(
        &self,
        id: &str,
        agent_id: &str,
        step_id: StepId,
    ) -> Result<AgentBinding, StateError> {
        let binding = AgentBinding::running(step_id);
        self.modify(id, |state| {
            state
                .agent_bindings
                .insert(agent_id.to_string(), binding.clone());
            Ok(())
        })?;
        info!(workflow_id = id, agent_id, step = %binding.step_id, "agent bound");
        Ok(binding)
    }

    pub fn update_agent_binding(
        &self,
        id: &str,
        agent_id: &str,
        update: BindingUpdate,
    ) -> Result<AgentBinding, StateError> {
        let mut updated = None;
        self.modify(id, |state| {
            let binding = state.agent_bindings.get_mut(agent_id).ok_or_else(|| {
                StateError::BindingNotFound {
                    workflow_id: state.id.clone(),
                    agent_id: agent_id.to_string(),
                }
            })?;
            match &update {
                BindingUpdate::Done(result) => {
                    binding.status = BindingStatus::Done;
                    binding.result = Some(*result);
                }
                BindingUpdate::Stopped => binding.status = BindingStatus::Stopped,
                BindingUpdate::Child(child) => binding.child_workflow_id = Some(child.clone()),
            }
            updated = Some(binding.clone());
            Ok(())
        })?;
        debug!(workflow_id = id, agent_id, ?update, "agent binding updated");
        updated.ok_or_else(|| StateError::BindingNotFound {
            workflow_id: id.to_string(),
            agent_id: agent_id.to_string(),
        })
    }

    /// Pass/fail of a child run, or `None` while it is still going
    pub fn get_child_workflow_result(
        &self,
        child_id: &str,
    ) -> Result<Option<StepResult>, StateError> {
        Ok(self.load(child_id)?.outcome())
    }

    // -- substeps ----------------------------------------------------------

    /// Reset substep tracking to the fixed substeps of `step`
    pub fn initialize_substeps(
        &self,
        id: &str,
        step: &Step,
    ) -> Result<Vec<SubstepState>, StateError> {
        let state = self.modify(id, |state| {
            state.substep_states = initial_substeps(step);
            Ok(())
        })?;
        Ok(state.substep_states)
    }

    /// Track a new instance of a `{n}` substep, returning its id
    pub fn add_dynamic_substep(&self, id: &str) -> Result<SubstepRef, StateError> {
        let mut added = SubstepRef::Numeric(1);
        self.modify(id, |state| {
            let next = state
                .substep_states
                .iter()
                .filter_map(|s| match s.id {
                    SubstepRef::Numeric(n) => Some(n),
                    _ => None,
                })
                .max()
                .map_or(1, |n| n.saturating_add(1));
            added = SubstepRef::Numeric(next);
            state
                .substep_states
                .push(SubstepState::pending(added.clone()));
            Ok(())
        })?;
        Ok(added)
    }

    /// Mark a substep as running, optionally owned by an agent
    pub fn start_substep(
        &self,
        id: &str,
        substep: &SubstepRef,
        agent_id: Option<&str>,
    ) -> Result<(), StateError> {
        self.modify(id, |state| {
            let entry = tracked_substep(state, substep)?;
            entry.status = SubstepStatus::Running;
            entry.agent_id = agent_id.map(str::to_string);
            Ok(())
        })
        .map(drop)
    }

    /// Record a substep's result
    pub fn complete_substep(
        &self,
        id: &str,
        substep: &SubstepRef,
        result: StepResult,
    ) -> Result<WorkflowState, StateError> {
        self.modify(id, |state| {
            let entry = tracked_substep(state, substep)?;
            entry.status = SubstepStatus::Done;
            entry.result = Some(result);
            Ok(())
        })
    }

    /// Aggregate tracked substeps against `transitions`
    pub fn substep_outcome<T: HasTransitions + ?Sized>(
        &self,
        id: &str,
        transitions: &T,
    ) -> Result<Option<ConditionResult>, StateError> {
        let state = self.load(id)?;
        Ok(evaluate_substep_aggregation(
            &state.substep_states,
            transitions,
        ))
    }

    // -- internals ---------------------------------------------------------

    fn lock(&self) -> Result<StoreLock, StateError> {
        StoreLock::acquire(&self.config.lock_path, self.config.lock_timeout)
    }

    fn write_state(&self, state: &WorkflowState) -> Result<(), StateError> {
        store::write_json(&self.config.run_path(&state.id), state)
    }

    fn read_session(&self) -> Result<Session, StateError> {
        Ok(store::read_json(&self.config.session_path)?.unwrap_or_default())
    }

    fn write_session(&self, session: &Session) -> Result<(), StateError> {
        store::write_json(&self.config.session_path, session)
    }

    /// Locked load, mutate and save of one run
    fn modify(
        &self,
        id: &str,
        f: impl FnOnce(&mut WorkflowState) -> Result<(), StateError>,
    ) -> Result<WorkflowState, StateError> {
        let _lock = self.lock()?;
        let mut state = self.load(id)?;
        f(&mut state)?;
        state.updated_at = self.clock.now();
        self.write_state(&state)?;
        Ok(state)
    }

    /// Locked load, mutate and save of the session
    fn modify_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, StateError>,
    ) -> Result<T, StateError> {
        let _lock = self.lock()?;
        let mut session = self.read_session()?;
        let value = f(&mut session)?;
        self.write_session(&session)?;
        Ok(value)
    }
}

fn compile(steps: &[Step]) -> Result<Machine, StateError> {
    Machine::compile(steps).map_err(|e| StateError::EngineInit {
        message: e.to_string(),
    })
}

/// Actor at the run's snapshot, or rebuilt from its step fields
fn hydrate(state: &WorkflowState, machine: Machine) -> Result<MachineActor, StateError> {
    if let Some(snapshot) = &state.snapshot {
        match MachineActor::restore(machine.clone(), snapshot.clone()) {
            Ok(actor) => return Ok(actor),
            Err(e) => warn!(
                workflow_id = %state.id,
                error = %e,
                "snapshot rejected, rebuilding from step position"
            ),
        }
    }

    let position = state.step_id();
    let key = machine
        .resolve(&position)
        .ok_or_else(|| StateError::EngineInit {
            message: format!("step {} is not part of the runbook", position),
        })?;
    let mut snapshot = MachineSnapshot::at(key);
    snapshot.context.retry_count = state.retry_count;
    snapshot.context.variables = state.variables.clone();
    MachineActor::restore(machine, snapshot).map_err(|e| StateError::EngineInit {
        message: e.to_string(),
    })
}

/// Fold a machine snapshot into the persisted run
fn apply_snapshot(state: &mut WorkflowState, mut snapshot: MachineSnapshot, steps: &[Step]) {
    let mut variables = snapshot.context.variables.clone();

    match &snapshot.state {
        StateKey::Step { step, substep } => {
            let instance = if step.is_dynamic() {
                match state.instance {
                    Some(n) if state.step.is_dynamic() && snapshot.context.next_instance => {
                        Some(n.saturating_add(1))
                    }
                    Some(n) if state.step.is_dynamic() => Some(n),
                    _ => Some(1),
                }
            } else {
                None
            };

            let entered = *step != state.step || instance != state.instance;
            if entered || state.snapshot.is_none() {
                state.substep_states = steps
                    .iter()
                    .find(|s| &s.name == step)
                    .map(initial_substeps)
                    .unwrap_or_default();
            }
            state.step = step.clone();
            state.substep = substep.clone();
            state.instance = instance;
            // Counted once; a later write-back without a send must not count it again
            snapshot.context.next_instance = false;
        }
        StateKey::Complete => {
            variables.insert(COMPLETED_VAR.to_string(), Value::Bool(true));
        }
        StateKey::Stopped => {
            variables.insert(STOPPED_VAR.to_string(), Value::Bool(true));
        }
    }
    if let Some(message) = &snapshot.message {
        variables.insert(MESSAGE_VAR.to_string(), Value::String(message.clone()));
    }

    state.retry_count = snapshot.context.retry_count;
    snapshot.context.variables = variables.clone();
    state.variables = variables;
    state.snapshot = Some(snapshot);
}

fn initial_substeps(step: &Step) -> Vec<SubstepState> {
    step.substeps
        .iter()
        .filter(|s| !s.is_dynamic)
        .map(|s| SubstepState::pending(s.id.clone()))
        .collect()
}

fn tracked_substep<'a>(
    state: &'a mut WorkflowState,
    substep: &SubstepRef,
) -> Result<&'a mut SubstepState, StateError> {
    let workflow_id = state.id.clone();
    state
        .substep_states
        .iter_mut()
        .find(|s| &s.id == substep)
        .ok_or_else(|| StateError::SubstepNotFound {
            workflow_id,
            substep: substep.to_string(),
        })
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
