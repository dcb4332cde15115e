//! Runbook rendering specs
//!
//! Verify a rendered runbook parses back to the same workflow.

use crate::prelude::*;
use similar_asserts::assert_eq;
use stepwise_runbook::render_workflow;

const RELEASE: &str = r#"---
name: release
version: "2"
tags: [ops]
---

# Release

Cut and publish a release.

## 1. Build

```bash
cargo build --release
```

- PASS: CONTINUE
- FAIL: RETRY 3 STOP "build broken"

## 2. Verify

- PASS ANY: CONTINUE
- FAIL: GOTO 1

### 2.1 (tester). Unit tests

```bash
make test
```

### 2.2 Review

```prompt
Does the changelog read well?
```

- YES: CONTINUE
- NO: STOP "changelog needs work"

## 3. Publish

- [notify](notify.runbook.md)

## {N}. Follow up

### {N}.{n} Ticket

- PASS: GOTO NEXT
- FAIL: COMPLETE
"#;

#[test]
fn rendered_runbook_parses_to_same_workflow() {
    let temp = Project::empty();
    temp.file("release.runbook.md", RELEASE);
    let original = temp.runbook("release.runbook.md");

    temp.file("rendered.runbook.md", &render_workflow(&original));
    let reparsed = temp.runbook("rendered.runbook.md");

    assert_eq!(reparsed, original);
}

#[test]
fn rendering_is_stable() {
    let temp = Project::empty();
    temp.file("release.runbook.md", RELEASE);
    let once = render_workflow(&temp.runbook("release.runbook.md"));

    temp.file("again.runbook.md", &once);
    let twice = render_workflow(&temp.runbook("again.runbook.md"));
    assert_eq!(twice, once);
}

#[test]
fn parsed_structure() {
    let temp = Project::empty();
    temp.file("release.runbook.md", RELEASE);
    let workflow = temp.runbook("release.runbook.md");

    assert_eq!(workflow.name.as_deref(), Some("release"));
    assert_eq!(workflow.steps.len(), 4);
    let verify = &workflow.steps[1];
    assert_eq!(verify.substeps.len(), 2);
    assert_eq!(verify.substeps[0].agent_type.as_deref(), Some("tester"));
    assert!(!verify.transitions.as_ref().unwrap().all);
    assert_eq!(
        workflow.steps[2].child_runbooks,
        vec![PathBuf::from("notify.runbook.md")]
    );
    assert!(workflow.steps[3].is_dynamic);
    assert!(workflow.steps[3].substeps[0].is_dynamic);
}
