//! Child runbook specs
//!
//! Verify a parent run hands a step to an agent running a child runbook
//! and resumes once the child reports back.

use crate::prelude::*;
use similar_asserts::assert_eq;
use stepwise_engine::Event;
use stepwise_storage::{BindingStatus, BindingUpdate, PendingStep};

const PARENT: &str = "\
## 1. Prepare

## 2. Delegate

- [check](check.runbook.md)

- PASS: CONTINUE
- FAIL: STOP \"child failed\"

## 3. Wrap up

- PASS: COMPLETE
- FAIL: STOP
";

const CHILD: &str = "\
---
name: check
---

## 1. Lint

```bash
make lint
```

## 2. Test

```bash
make test
```

- PASS: COMPLETE
- FAIL: STOP \"tests failed\"
";

struct Family {
    temp: Project,
    manager: Manager,
    parent: Workflow,
    child: Workflow,
    parent_id: String,
}

fn family() -> Family {
    let temp = Project::empty();
    let parent_path = temp.file("parent.runbook.md", PARENT);
    temp.file("check.runbook.md", CHILD);
    let manager = temp.manager();
    let parent = temp.runbook("parent.runbook.md");
    let child = temp.runbook("check.runbook.md");
    let parent_id = manager
        .create(&parent_path, &parent, CreateOptions::default())
        .unwrap()
        .id;
    Family {
        temp,
        manager,
        parent,
        child,
        parent_id,
    }
}

/// Dispatch step 2 to `agent` and start the child run on its stack
fn delegate(f: &Family, agent: &str) -> String {
    let state = f
        .manager
        .send_event(&f.parent_id, &f.parent.steps, Event::Pass)
        .unwrap();
    assert_eq!(state.step_id(), StepId::numeric(2));

    f.manager
        .push_pending_step(
            &f.parent_id,
            PendingStep {
                step_id: state.step_id(),
                workflow: Some("check".into()),
            },
        )
        .unwrap();

    // The agent claims the oldest pending step
    let pending = f.manager.pop_pending_step(&f.parent_id).unwrap().unwrap();
    f.manager
        .bind_agent(&f.parent_id, agent, pending.step_id.clone())
        .unwrap();

    let child_id = f
        .manager
        .create(
            &f.temp.path().join("check.runbook.md"),
            &f.child,
            CreateOptions {
                agent_id: Some(agent.into()),
                parent_workflow_id: Some(f.parent_id.clone()),
                parent_step_id: Some(pending.step_id),
                prompted: false,
            },
        )
        .unwrap()
        .id;
    f.manager
        .update_agent_binding(&f.parent_id, agent, BindingUpdate::Child(child_id.clone()))
        .unwrap();
    child_id
}

/// Report the child's outcome back to the parent
fn report(f: &Family, agent: &str, child_id: &str) -> WorkflowState {
    let result = f
        .manager
        .get_child_workflow_result(child_id)
        .unwrap()
        .unwrap();
    f.manager
        .update_agent_binding(&f.parent_id, agent, BindingUpdate::Done(result))
        .unwrap();
    assert_eq!(
        f.manager.pop_workflow(Some(agent)).unwrap().as_deref(),
        Some(child_id)
    );
    let event = match result {
        StepResult::Pass => Event::Pass,
        StepResult::Fail => Event::Fail,
    };
    f.manager
        .send_event(&f.parent_id, &f.parent.steps, event)
        .unwrap()
}

#[test]
fn child_success_advances_parent() {
    let f = family();
    let child_id = delegate(&f, "agent-1");

    assert_eq!(f.manager.require_active(Some("agent-1")).unwrap(), child_id);
    assert_eq!(f.manager.require_active(None).unwrap(), f.parent_id);
    assert_eq!(f.manager.get_child_workflow_result(&child_id).unwrap(), None);

    let child = drive(&f.manager, &child_id, &f.child, &FakeExecutor::new(), 10);
    assert_eq!(child.parent_workflow_id.as_deref(), Some(f.parent_id.as_str()));

    let parent = report(&f, "agent-1", &child_id);
    assert_eq!(parent.step, StepRef::Numeric(3));
    let binding = &parent.agent_bindings["agent-1"];
    assert_eq!(binding.status, BindingStatus::Done);
    assert_eq!(binding.child_workflow_id.as_deref(), Some(child_id.as_str()));
    assert_eq!(binding.result, Some(StepResult::Pass));
}

#[test]
fn child_failure_stops_parent() {
    let f = family();
    let child_id = delegate(&f, "agent-1");

    let executor = FakeExecutor::with_results([ExecResult::success(), ExecResult::failure(1)]);
    let child = drive(&f.manager, &child_id, &f.child, &executor, 10);
    assert_eq!(child.message(), Some("tests failed"));

    let parent = report(&f, "agent-1", &child_id);
    assert!(parent.is_stopped());
    assert_eq!(parent.message(), Some("child failed"));
}

#[test]
fn parent_can_be_stashed_while_child_runs() {
    let f = family();
    let child_id = delegate(&f, "agent-1");

    assert_eq!(f.manager.stash(None).unwrap(), f.parent_id);
    assert_eq!(f.manager.active_workflow(None).unwrap(), None);

    drive(&f.manager, &child_id, &f.child, &FakeExecutor::new(), 10);
    assert_eq!(f.manager.pop_stashed(None).unwrap(), f.parent_id);
    assert_eq!(report(&f, "agent-1", &child_id).step, StepRef::Numeric(3));
}
