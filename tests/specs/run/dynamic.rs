//! Dynamic step specs
//!
//! Verify `{N}` steps repeat as fresh instances and track `{n}` substeps.

use crate::prelude::*;
use similar_asserts::assert_eq;
use stepwise_engine::{ConditionResult, Event};

const TRIAGE: &str = "\
## 1. Collect

```bash
./collect
```

## {N}. Issue

- PASS: GOTO NEXT
- FAIL: GOTO {N}

### {N}.1 Reproduce

```bash
./reproduce
```

### {N}.2 Fix

```bash
./fix
```

- PASS: GOTO NEXT
- FAIL: COMPLETE \"no more issues\"
";

fn start(temp: &Project, manager: &Manager) -> (Workflow, String) {
    let path = temp.file("triage.runbook.md", TRIAGE);
    let workflow = temp.runbook("triage.runbook.md");
    let id = manager
        .create(&path, &workflow, CreateOptions::default())
        .unwrap()
        .id;
    (workflow, id)
}

#[test]
fn each_goto_next_starts_a_new_instance() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);

    let executor = FakeExecutor::with_results([
        // collect
        ExecResult::success(),
        // instance 1: reproduce, fix
        ExecResult::success(),
        ExecResult::success(),
        // instance 2: reproduce, fix
        ExecResult::success(),
        ExecResult::success(),
    ]);
    let state = drive(&manager, &id, &workflow, &executor, 5);
    assert_eq!(state.step, StepRef::Dynamic);
    assert_eq!(state.substep, Some(SubstepRef::Numeric(1)));
    assert_eq!(state.instance, Some(3));
    assert!(!state.snapshot.unwrap().context.next_instance);
}

#[test]
fn failing_fix_completes_the_run() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);

    let executor = FakeExecutor::with_results([
        ExecResult::success(),
        ExecResult::success(),
        ExecResult::failure(1),
    ]);
    let state = drive(&manager, &id, &workflow, &executor, 10);
    assert!(state.is_completed());
    assert_eq!(state.message(), Some("no more issues"));
    assert_eq!(state.instance, Some(1));
}

#[test]
fn failing_reproduce_retries_in_place() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);

    manager.send_event(&id, &workflow.steps, Event::Pass).unwrap();
    for expected in 1..=3 {
        let state = manager.send_event(&id, &workflow.steps, Event::Fail).unwrap();
        assert_eq!(state.step_id(), StepId::parse("{N}.1").unwrap());
        assert_eq!(state.retry_count, expected);
    }
}

#[test]
fn goto_next_from_outside_is_rejected_only_when_missing() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);

    let state = manager.goto(&id, &workflow.steps, &StepId::next()).unwrap();
    assert_eq!(state.step_id(), StepId::parse("{N}.1").unwrap());

    let plain = temp.file("plain.runbook.md", "## 1. Only\n");
    let plain_wf = temp.runbook("plain.runbook.md");
    let plain_id = manager
        .create(&plain, &plain_wf, CreateOptions::default())
        .unwrap()
        .id;
    let err = manager
        .goto(&plain_id, &plain_wf.steps, &StepId::next())
        .unwrap_err();
    assert_eq!(err.code(), "E_GOTO_UNRESOLVED");
}

#[test]
fn substep_results_aggregate_for_the_instance() {
    let temp = Project::empty();
    let manager = temp.manager();
    let (workflow, id) = start(&temp, &manager);

    let state = manager.send_event(&id, &workflow.steps, Event::Pass).unwrap();
    assert_eq!(state.substep_states.len(), 2);

    let dynamic = workflow.dynamic_step().unwrap();
    manager
        .complete_substep(&id, &SubstepRef::Numeric(1), StepResult::Pass)
        .unwrap();
    assert_eq!(manager.substep_outcome(&id, dynamic).unwrap(), None);
    manager
        .complete_substep(&id, &SubstepRef::Numeric(2), StepResult::Pass)
        .unwrap();
    assert_eq!(
        manager.substep_outcome(&id, dynamic).unwrap(),
        Some(ConditionResult::Goto {
            target: StepId::next()
        })
    );
}
