//! Shared fixtures for specs

pub use std::path::{Path, PathBuf};
pub use stepwise_core::{FakeClock, SequentialIdGen, StepId, StepRef, SubstepRef};
pub use stepwise_engine::{
    step_event, ExecResult, Executor, FakeExecutor, StateKey, StepResult,
};
pub use stepwise_runbook::{parse_workflow_file, ParseOptions, Workflow};
pub use stepwise_storage::{CreateOptions, StateManager, StoreConfig, WorkflowState};

pub type Manager = StateManager<FakeClock, SequentialIdGen>;

/// Temp project with its own state directory
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to a project-relative path, creating parents
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn manager(&self) -> Manager {
        StateManager::with_deps(
            StoreConfig::at(self.dir.path().join(".state")),
            FakeClock::new(),
            SequentialIdGen::new("run"),
        )
    }

    pub fn runbook(&self, rel: &str) -> Workflow {
        parse_workflow_file(&self.dir.path().join(rel), ParseOptions::default()).unwrap()
    }
}

/// Run commands for the active step until the run finishes or `limit` events
pub fn drive(
    manager: &Manager,
    id: &str,
    workflow: &Workflow,
    executor: &impl Executor,
    limit: usize,
) -> WorkflowState {
    let mut state = manager.load(id).unwrap();
    for _ in 0..limit {
        if state.outcome().is_some() {
            break;
        }
        let step = workflow.get_step(&state.step).unwrap();
        let command = match &state.substep {
            Some(sub) => step.get_substep(sub).and_then(|s| s.command.as_ref()),
            None => step.command.as_ref(),
        };
        let code = command.map(|c| c.code.as_str()).unwrap_or("true");
        let result = executor.execute(code, Path::new(".")).unwrap();
        state = manager
            .send_event(id, &workflow.steps, step_event(&result))
            .unwrap();
    }
    state
}
