// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::parser::{parse_workflow, parse_workflow_with, ParseOptions};
use proptest::prelude::*;
use yare::parameterized;
use stepwise_core::{
    Action, NonRetryAction, SideKind, StepId, StepRef, SubstepRef, TransitionSide,
};

#[test]
fn renders_minimal_workflow() {
    let mut step = Step::new(StepRef::Numeric(1), "Build");
    step.command = Some(Command::new("make"));
    step.transitions = Some(Transitions::new(
        Action::CONTINUE,
        Action::retry(2, NonRetryAction::stop("Build failed")),
    ));
    let workflow = Workflow {
        title: Some("Release".into()),
        steps: vec![step],
        ..Workflow::default()
    };

    assert_eq!(
        render_workflow(&workflow),
        "# Release\n\n## 1. Build\n\n```bash\nmake\n```\n\n- PASS: CONTINUE\n- FAIL: RETRY 2 STOP \"Build failed\"\n"
    );
}

#[test]
fn renders_substep_headers_and_any_mode() {
    let mut step = Step::new(StepRef::Numeric(1), "Fan out");
    step.transitions = Some(Transitions::default().with_all(false));
    let mut substep = Substep::new(SubstepRef::Dynamic, "Task");
    substep.agent_type = Some("worker".into());
    step.substeps.push(substep);
    let workflow = Workflow {
        steps: vec![step],
        ..Workflow::default()
    };

    let text = render_workflow(&workflow);
    assert!(text.contains("- PASS ANY: CONTINUE\n- FAIL: STOP\n"), "{}", text);
    assert!(text.contains("### 1.{n} (worker). Task\n"), "{}", text);
}

#[test]
fn full_runbook_round_trips() {
    let text = r#"---
name: deploy
version: "1.0"
tags: [ops, prod]
---

# Deploy

Rolls out a build.

## 1. Build

```bash
cargo build
```

- PASS: CONTINUE
- FAIL: RETRY 2 GOTO 3

## 2. Review

Look at it.

- child.runbook.md

### 2.1 (reviewer) Read

- YES: CONTINUE
- NO: STOP "rejected"

### 2.{n}. Extra

## 3. Done

- PASS: COMPLETE
- FAIL: STOP
"#;
    let workflow = parse_workflow(text).unwrap();
    let rendered = render_workflow(&workflow);
    assert_eq!(parse_workflow(&rendered).unwrap(), workflow, "{}", rendered);
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn description() -> impl Strategy<Value = String> {
    ("[A-Z][a-z]{0,6}", prop::collection::vec(word(), 0..3))
        .prop_map(|(head, rest)| std::iter::once(head).chain(rest).collect::<Vec<_>>().join(" "))
}

fn message() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z \"\\\\]{0,10}")
}

fn target() -> impl Strategy<Value = StepId> {
    prop_oneof![
        (1u32..6).prop_map(StepId::numeric),
        (1u32..6, 1u32..4).prop_filter_map("substep target", |(s, n)| {
            StepId::substep(StepRef::Numeric(s), SubstepRef::Numeric(n))
        }),
        Just(StepId::step(StepRef::Dynamic)),
        Just(StepId::parse("{N}.{n}").unwrap()),
        Just(StepId::next()),
    ]
}

fn non_retry() -> impl Strategy<Value = NonRetryAction> {
    prop_oneof![
        Just(NonRetryAction::Continue),
        message().prop_map(|message| NonRetryAction::Complete { message }),
        message().prop_map(|message| NonRetryAction::Stop { message }),
        target().prop_map(NonRetryAction::goto),
    ]
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        non_retry().prop_map(Action::from),
        (1u32..5, non_retry()).prop_map(|(max, then)| Action::retry(max, then)),
    ]
}

fn transitions() -> impl Strategy<Value = Transitions> {
    (any::<bool>(), any::<bool>(), action(), action()).prop_map(|(all, prompt, pass, fail)| {
        let (pass_kind, fail_kind) = if prompt {
            (SideKind::Yes, SideKind::No)
        } else {
            (SideKind::Pass, SideKind::Fail)
        };
        Transitions {
            all,
            pass: TransitionSide {
                kind: pass_kind,
                action: pass,
            },
            fail: TransitionSide {
                kind: fail_kind,
                action: fail,
            },
        }
    })
}

#[derive(Debug, Clone)]
struct Body {
    command: Option<Command>,
    prompt: Option<String>,
    children: Vec<PathBuf>,
    transitions: Option<Transitions>,
}

fn body() -> impl Strategy<Value = Body> {
    (
        prop::option::of("[a-z]{1,8}( --[a-z]{1,5})?".prop_map(Command::new)),
        prop::option::of(prop::collection::vec("[A-Za-z][a-z ]{0,12}[a-z.]", 1..3)),
        prop::collection::vec("[a-z]{1,6}\\.runbook\\.md".prop_map(PathBuf::from), 0..2),
        prop::option::of(transitions()),
    )
        .prop_map(|(command, prompt, children, transitions)| Body {
            command,
            prompt: prompt.map(|lines| lines.join("\n")),
            children,
            transitions,
        })
}

fn substep(id: SubstepRef) -> impl Strategy<Value = Substep> {
    (description(), prop::option::of(word()), body()).prop_map(move |(desc, agent, body)| {
        let mut substep = Substep::new(id.clone(), desc);
        substep.agent_type = agent;
        substep.command = body.command;
        substep.prompt = body.prompt;
        substep.child_runbooks = body.children;
        substep.transitions = body.transitions;
        substep
    })
}

fn step(name: StepRef) -> impl Strategy<Value = Step> {
    (description(), body(), 0usize..3, any::<bool>())
        .prop_flat_map(move |(desc, body, count, dynamic_tail)| {
            let mut ids: Vec<SubstepRef> = (1..=count as u32).map(SubstepRef::Numeric).collect();
            if dynamic_tail {
                ids.push(SubstepRef::Dynamic);
            }
            let substeps: Vec<_> = ids.into_iter().map(substep).collect();
            let name = name.clone();
            substeps.prop_map(move |substeps| {
                let mut step = Step::new(name.clone(), desc.clone());
                step.command = body.command.clone();
                step.prompt = body.prompt.clone();
                step.child_runbooks = body.children.clone();
                step.transitions = body.transitions.clone();
                step.substeps = substeps;
                step
            })
        })
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    (1u32..4, any::<bool>()).prop_flat_map(|(count, dynamic)| {
        let mut names: Vec<StepRef> = (1..=count).map(StepRef::Numeric).collect();
        if dynamic {
            names.push(StepRef::Dynamic);
        }
        names.into_iter().map(step).collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn rendered_steps_parse_back_equal(steps in steps()) {
        let workflow = Workflow { steps, ..Workflow::default() };
        let rendered = render_workflow(&workflow);
        let parsed = parse_workflow_with(&rendered, ParseOptions::skip_validation()).unwrap();
        prop_assert_eq!(parsed.steps, workflow.steps, "{}", rendered);
    }
}

#[parameterized(
    plain = { "build.runbook.md", "- build.runbook.md\n" },
    spaced = { "my checks/lint all.runbook.md", "- [lint all.runbook.md](<my checks/lint all.runbook.md>)\n" },
    backtick = { "odd`name.runbook.md", "- [odd`name.runbook.md](<odd`name.runbook.md>)\n" },
    bracketed = { "[x](y).runbook.md", "- [x(y).runbook.md](<[x](y).runbook.md>)\n" },
)]
fn child_paths_render_in_a_parseable_form(path: &str, line: &str) {
    let mut step = Step::new(StepRef::Numeric(1), "Delegate");
    step.child_runbooks = vec![PathBuf::from(path)];
    let workflow = Workflow {
        steps: vec![step],
        ..Workflow::default()
    };

    let rendered = render_workflow(&workflow);
    assert!(rendered.contains(line), "{}", rendered);
    let parsed = parse_workflow(&rendered).unwrap();
    assert_eq!(parsed.steps, workflow.steps, "{}", rendered);
}
