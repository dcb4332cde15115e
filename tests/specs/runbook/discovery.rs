//! Runbook discovery specs
//!
//! Verify runbooks are found by name and broken files are skipped.

use crate::prelude::*;
use similar_asserts::assert_eq;
use stepwise_runbook::{find_runbook, find_runbooks, FindError};

const DEPLOY: &str = "---
name: deploy
description: Ship it
---

# Deploy

## 1. Build

```bash
make
```
";

const CHECK: &str = "## 1. Check\n\n- PASS: COMPLETE\n- FAIL: STOP\n";

fn project() -> Project {
    let temp = Project::empty();
    temp.file("runbooks/release.runbook.md", DEPLOY);
    temp.file("runbooks/nested/check.runbook.md", CHECK);
    temp.file("runbooks/.drafts/hidden.runbook.md", CHECK);
    temp.file("runbooks/notes.md", "# not a runbook\n");
    temp
}

#[test]
fn lists_runbooks_by_name() {
    let temp = project();
    let found = find_runbooks(&temp.path().join("runbooks")).unwrap();
    let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["check", "deploy"]);
    assert_eq!(found[1].workflow.title.as_deref(), Some("Deploy"));
}

#[test]
fn broken_runbooks_are_skipped() {
    let temp = project();
    temp.file("runbooks/broken.runbook.md", "## 2. Starts late\n");

    let found = find_runbooks(&temp.path().join("runbooks")).unwrap();
    assert_eq!(found.len(), 2);
}

#[test]
fn finds_one_runbook_by_frontmatter_name() {
    let temp = project();
    let found = find_runbook(&temp.path().join("runbooks"), "deploy")
        .unwrap()
        .unwrap();
    assert!(found.path.ends_with("release.runbook.md"));
}

#[test]
fn missing_runbook_reports_skipped_files() {
    let temp = project();
    temp.file("runbooks/broken.runbook.md", "## 2. Starts late\n");

    let err = find_runbook(&temp.path().join("runbooks"), "broken").unwrap_err();
    match err {
        FindError::NotFoundSkipped { name, count, .. } => {
            assert_eq!(name, "broken");
            assert_eq!(count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_directory_is_empty() {
    let temp = Project::empty();
    assert!(find_runbooks(&temp.path().join("nowhere")).unwrap().is_empty());
}
