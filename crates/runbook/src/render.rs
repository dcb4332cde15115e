// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Render a workflow back into runbook Markdown
//!
//! Output re-parses to the same structure. Prompts are always written as
//! `prompt` fences and step transitions come before any substeps.

use crate::types::{Command, Step, Substep, Workflow};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use stepwise_core::Transitions;

/// Render a workflow as runbook text
pub fn render_workflow(workflow: &Workflow) -> String {
    let mut out = String::new();

    if let Some(frontmatter) = render_frontmatter(workflow) {
        out.push_str("---\n");
        out.push_str(&frontmatter);
        out.push_str("---\n\n");
    }
    if let Some(title) = &workflow.title {
        out.push_str(&format!("# {}\n\n", title));
    }
    if let Some(description) = &workflow.description {
        out.push_str(description);
        out.push_str("\n\n");
    }

    for step in &workflow.steps {
        render_step(&mut out, step);
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

fn render_frontmatter(workflow: &Workflow) -> Option<String> {
    let name = workflow.name.as_ref()?;
    let mut mapping = Mapping::new();
    mapping.insert("name".into(), Value::String(name.clone()));
    if let Some(version) = &workflow.version {
        mapping.insert("version".into(), Value::String(version.clone()));
    }
    if !workflow.tags.is_empty() {
        let tags = workflow.tags.iter().cloned().map(Value::String).collect();
        mapping.insert("tags".into(), Value::Sequence(tags));
    }
    match serde_yaml::to_string(&mapping) {
        Ok(yaml) => Some(yaml),
        Err(e) => {
            tracing::warn!(error = %e, "failed to render frontmatter");
            None
        }
    }
}

fn render_step(out: &mut String, step: &Step) {
    if step.description.is_empty() {
        out.push_str(&format!("## {}\n\n", step.name));
    } else {
        out.push_str(&format!("## {}. {}\n\n", step.name, step.description));
    }
    render_body(
        out,
        step.command.as_ref(),
        step.prompt.as_deref(),
        &step.child_runbooks,
        step.transitions.as_ref(),
    );
    for substep in &step.substeps {
        render_substep(out, step, substep);
    }
}

fn render_substep(out: &mut String, step: &Step, substep: &Substep) {
    out.push_str(&format!("### {}.{}", step.name, substep.id));
    if let Some(agent) = &substep.agent_type {
        out.push_str(&format!(" ({})", agent));
    }
    if !substep.description.is_empty() {
        out.push_str(&format!(". {}", substep.description));
    }
    out.push_str("\n\n");
    render_body(
        out,
        substep.command.as_ref(),
        substep.prompt.as_deref(),
        &substep.child_runbooks,
        substep.transitions.as_ref(),
    );
}

fn render_body(
    out: &mut String,
    command: Option<&Command>,
    prompt: Option<&str>,
    children: &[PathBuf],
    transitions: Option<&Transitions>,
) {
    if let Some(command) = command {
        out.push_str(&format!("```bash\n{}\n```\n\n", command.code));
    }
    if let Some(prompt) = prompt {
        out.push_str(&format!("```prompt\n{}\n```\n\n", prompt));
    }
    if !children.is_empty() {
        for child in children {
            out.push_str(&render_child(child));
        }
        out.push('\n');
    }
    if let Some(transitions) = transitions {
        let qualifier = if transitions.all { "" } else { " ANY" };
        out.push_str(&format!(
            "- {}{}: {}\n",
            transitions.pass.kind.keyword(),
            qualifier,
            transitions.pass.action
        ));
        out.push_str(&format!(
            "- {}: {}\n\n",
            transitions.fail.kind.keyword(),
            transitions.fail.action
        ));
    }
}

/// Bare paths cannot hold whitespace or backticks, or start like a link;
/// those use an angle-bracket link destination instead
fn render_child(child: &Path) -> String {
    let path = child.display().to_string();
    let bare = !path.starts_with('[') && !path.contains(|c: char| c.is_whitespace() || c == '`');
    if bare {
        return format!("- {}\n", path);
    }
    let label: String = child
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(|c| !matches!(c, '[' | ']'))
        .collect();
    format!("- [{}](<{}>)\n", label, path)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
