//! Run execution specs
//!
//! Verify runs advance, retry and finish according to their transitions.

use crate::prelude::*;
use similar_asserts::assert_eq;

const BUILD: &str = r#"# Build

## 1. Compile

```bash
make
```

- PASS: CONTINUE
- FAIL: RETRY 2 STOP "Build failed"

## 2. Test

```bash
make test
```

- PASS: COMPLETE "shipped"
- FAIL: GOTO 1
"#;

fn start(temp: &Project, manager: &Manager) -> (Workflow, String) {
    let path = temp.file("build.runbook.md", BUILD);
    let workflow = temp.runbook("build.runbook.md");
    let state = manager
        .create(&path, &workflow, CreateOptions::default())
        .unwrap();
    (workflow, state.id)
}

#[test]
fn passing_commands_complete_the_run() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);
    let executor = FakeExecutor::new();

    let state = drive(&manager, &id, &workflow, &executor, 10);

    assert!(state.is_completed());
    assert_eq!(state.message(), Some("shipped"));
    let commands: Vec<_> = executor.calls().into_iter().map(|c| c.command).collect();
    assert_eq!(commands, vec!["make", "make test"]);
}

#[test]
fn failures_retry_then_stop() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);
    let executor = FakeExecutor::with_results([
        ExecResult::failure(1),
        ExecResult::failure(1),
        ExecResult::failure(2),
    ]);

    let state = drive(&manager, &id, &workflow, &executor, 10);

    assert!(state.is_stopped());
    assert_eq!(state.message(), Some("Build failed"));
    assert_eq!(state.retry_count, 2);
    assert_eq!(executor.calls().len(), 3);
}

#[test]
fn failed_test_jumps_back_with_fresh_retries() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);
    let executor = FakeExecutor::with_results([
        ExecResult::failure(1),
        ExecResult::success(),
        ExecResult::failure(1),
    ]);

    let state = drive(&manager, &id, &workflow, &executor, 3);
    assert_eq!(state.step, StepRef::Numeric(1));
    assert_eq!(state.retry_count, 0);

    let state = drive(&manager, &id, &workflow, &executor, 10);
    assert!(state.is_completed());
}

#[test]
fn state_file_survives_between_processes() {
    let temp = Project::empty();
    let (workflow, id) = start(&temp, &temp.manager());
    temp.manager()
        .send_event(&id, &workflow.steps, stepwise_engine::Event::Fail)
        .unwrap();

    // A fresh manager sees the same position
    let state = temp.manager().load(&id).unwrap();
    assert_eq!(state.retry_count, 1);
    assert_eq!(state.step_id(), StepId::numeric(1));

    let raw = std::fs::read_to_string(temp.manager().config().run_path(&id)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["snapshot"]["version"], 1);
    assert_eq!(json["snapshot"]["state"], "1");
    assert_eq!(json["snapshot"]["context"]["retry_count"], 1);
}

#[test]
fn stopping_deletes_the_run() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (_, id) = start(&temp, &manager);
    assert_eq!(manager.require_active(None).unwrap(), id);

    manager.delete(&id).unwrap();
    assert!(manager.list().unwrap().is_empty());
    assert_eq!(
        manager.require_active(None).unwrap_err().code(),
        "E_NO_ACTIVE_WORKFLOW"
    );
}
