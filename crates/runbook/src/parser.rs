// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Markdown runbook parsing
//!
//! The body is read line by line. `#` sets the title, `##` opens a step,
//! `###` opens a substep of the current step. Inside a section:
//! - a `bash`/`sh`/`shell` fence is the command
//! - a `prompt` fence (or any other prose) is the prompt
//! - `- PASS: <action>` / `- FAIL: <action>` lines declare transitions
//! - list items naming `*.runbook.md` files are child runbooks

use crate::action::parse_action;
use crate::frontmatter::{extract_frontmatter, Frontmatter};
use crate::types::{Command, Step, Substep, Workflow};
use crate::validator::{validate_steps, ValidationError, ValidationErrors};
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use stepwise_core::{
    Action, SideKind, StepIdError, StepRef, SubstepRef, TransitionSide, Transitions,
};
use thiserror::Error;

// Transition line pattern - this is a constant valid pattern
#[allow(clippy::expect_used)]
static TRANSITION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+(PASS|FAIL|YES|NO)(?:\s+(ALL|ANY))?\s*:\s*(.*?)\s*$")
        .expect("constant regex pattern is valid")
});

// Child runbook list item pattern - this is a constant valid pattern
#[allow(clippy::expect_used)]
static CHILD_RUNBOOK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*[-*]\s+(?:",
        r"\[[^\]]*\]\(<([^<>]+\.runbook\.md)>\)",
        r"|\[[^\]]*\]\(([^)\s]+\.runbook\.md)\)",
        r"|`?([^\s`]+\.runbook\.md)`?",
        r")\s*$"
    ))
        .expect("constant regex pattern is valid")
});

const FENCE: &str = "```";

/// Errors that can occur during runbook parsing
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is structurally broken
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.into(),
    }
}

/// Parser switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Only abort on syntax errors; skip structural validation
    pub skip_validation: bool,
}

impl ParseOptions {
    pub fn skip_validation() -> Self {
        Self {
            skip_validation: true,
        }
    }
}

/// Parse and validate a runbook
pub fn parse_workflow(text: &str) -> Result<Workflow, ParseError> {
    parse_workflow_with(text, ParseOptions::default())
}

/// Parse a runbook with explicit options
pub fn parse_workflow_with(text: &str, options: ParseOptions) -> Result<Workflow, ParseError> {
    let (frontmatter, body) = extract_frontmatter(text);
    // body is always a suffix of text
    let line_offset = text[..text.len() - body.len()].matches('\n').count();

    let mut parser = Parser::new(line_offset);
    parser.run(body)?;
    let (workflow, mut errors) = parser.finish(frontmatter);

    if !options.skip_validation {
        errors.extend(validate_steps(&workflow.steps));
        if !errors.is_empty() {
            return Err(ParseError::Validation(ValidationErrors::new(errors)));
        }
    }

    tracing::debug!(
        title = ?workflow.title,
        steps = workflow.steps.len(),
        "parsed runbook"
    );
    Ok(workflow)
}

/// Read and parse a runbook file
pub fn parse_workflow_file(path: &Path, options: ParseOptions) -> Result<Workflow, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_workflow_with(&text, options)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Step,
    Substep,
}

#[derive(Debug)]
struct SideLine {
    kind: SideKind,
    action: Action,
    all: Option<bool>,
    line: usize,
}

/// Content collected under one header
#[derive(Debug)]
struct Block {
    owner: Owner,
    location: String,
    prose: Vec<String>,
    command: Option<Command>,
    prompt: Option<String>,
    pass: Option<SideLine>,
    fail: Option<SideLine>,
    children: Vec<PathBuf>,
}

impl Block {
    fn new(owner: Owner, location: String) -> Self {
        Self {
            owner,
            location,
            prose: Vec::new(),
            command: None,
            prompt: None,
            pass: None,
            fail: None,
            children: Vec::new(),
        }
    }
}

struct Parser {
    line_offset: usize,
    title: Option<String>,
    preamble: Vec<String>,
    steps: Vec<Step>,
    block: Option<Block>,
    errors: Vec<ValidationError>,
}

impl Parser {
    fn new(line_offset: usize) -> Self {
        Self {
            line_offset,
            title: None,
            preamble: Vec::new(),
            steps: Vec::new(),
            block: None,
            errors: Vec::new(),
        }
    }

    fn run(&mut self, body: &str) -> Result<(), ParseError> {
        let lines: Vec<&str> = body.lines().collect();
        let mut index = 0;

        while index < lines.len() {
            let line = lines[index];
            let number = self.line_offset + index + 1;

            if let Some(lang) = fence_language(line) {
                let close = lines[index + 1..]
                    .iter()
                    .position(|l| is_fence_close(l))
                    .map(|offset| index + 1 + offset)
                    .ok_or_else(|| syntax(number, "unterminated code fence"))?;
                self.push_fence(&lang, &lines[index..=close], number)?;
                index = close + 1;
                continue;
            }

            if let Some(text) = heading(line, 3) {
                self.start_substep(text, number)?;
            } else if let Some(text) = heading(line, 2) {
                self.start_step(text, number)?;
            } else if let Some(text) = heading(line, 1).filter(|_| self.title.is_none()) {
                if self.block.is_none() {
                    self.title = Some(text.to_string());
                } else {
                    self.push_prose(line);
                }
            } else if let Some(captures) = TRANSITION_LINE.captures(line) {
                if self.block.is_some() {
                    self.push_transition(&captures, number)?;
                } else {
                    self.push_prose(line);
                }
            } else if let Some(captures) = CHILD_RUNBOOK_LINE.captures(line) {
                match self.block.as_mut() {
                    Some(block) => {
                        let path = (1..=3).find_map(|i| captures.get(i));
                        if let Some(path) = path {
                            block.children.push(PathBuf::from(path.as_str()));
                        }
                    }
                    None => self.push_prose(line),
                }
            } else {
                self.push_prose(line);
            }
            index += 1;
        }

        self.finish_block()
    }

    fn push_prose(&mut self, line: &str) {
        match self.block.as_mut() {
            Some(block) => block.prose.push(line.to_string()),
            None => self.preamble.push(line.to_string()),
        }
    }

    fn push_fence(&mut self, lang: &str, lines: &[&str], number: usize) -> Result<(), ParseError> {
        let Some(block) = self.block.as_mut() else {
            self.preamble.extend(lines.iter().map(|l| l.to_string()));
            return Ok(());
        };

        let content = lines[1..lines.len() - 1].join("\n");
        match lang {
            "bash" | "sh" | "shell" => {
                if block.command.is_some() {
                    return Err(syntax(
                        number,
                        format!("{} has more than one command block", block.location),
                    ));
                }
                block.command = Some(Command::new(content));
            }
            "prompt" => {
                if block.prompt.is_some() {
                    return Err(syntax(
                        number,
                        format!("{} has more than one prompt block", block.location),
                    ));
                }
                block.prompt = Some(content);
            }
            _ => block.prose.extend(lines.iter().map(|l| l.to_string())),
        }
        Ok(())
    }

    fn push_transition(&mut self, captures: &Captures<'_>, number: usize) -> Result<(), ParseError> {
        let Some(block) = self.block.as_mut() else {
            return Ok(());
        };

        let kind = match &captures[1] {
            "PASS" => SideKind::Pass,
            "FAIL" => SideKind::Fail,
            "YES" => SideKind::Yes,
            _ => SideKind::No,
        };
        // PASS ALL / FAIL ANY select ALL mode; PASS ANY / FAIL ALL select ANY mode
        let all = captures
            .get(2)
            .map(|q| (q.as_str() == "ALL") == kind.is_positive());

        let text = &captures[3];
        let action = parse_action(text)
            .map_err(|e| syntax(number, format!("invalid action '{}': {}", text, e)))?;

        let slot = if kind.is_positive() {
            &mut block.pass
        } else {
            &mut block.fail
        };
        if slot.is_some() {
            let side = if kind.is_positive() { "PASS" } else { "FAIL" };
            return Err(syntax(
                number,
                format!("{} declares more than one {} line", block.location, side),
            ));
        }
        *slot = Some(SideLine {
            kind,
            action,
            all,
            line: number,
        });
        Ok(())
    }

    fn start_step(&mut self, text: &str, number: usize) -> Result<(), ParseError> {
        self.finish_block()?;
        let (name, description) = parse_step_header(text).map_err(|m| syntax(number, m))?;
        let location = format!("step {}", name);
        self.steps.push(Step::new(name, description));
        self.block = Some(Block::new(Owner::Step, location));
        Ok(())
    }

    fn start_substep(&mut self, text: &str, number: usize) -> Result<(), ParseError> {
        self.finish_block()?;
        let header = parse_substep_header(text).map_err(|m| syntax(number, m))?;
        let Some(step) = self.steps.last_mut() else {
            return Err(syntax(number, "substep header before any step"));
        };
        if header.parent != step.name {
            return Err(syntax(
                number,
                format!(
                    "substep {}.{} is not part of step {}",
                    header.parent, header.id, step.name
                ),
            ));
        }

        let location = format!("step {}.{}", step.name, header.id);
        let mut substep = Substep::new(header.id, header.description);
        substep.agent_type = header.agent_type;
        step.substeps.push(substep);
        self.block = Some(Block::new(Owner::Substep, location));
        Ok(())
    }

    /// Move the open block's content onto its step or substep
    fn finish_block(&mut self) -> Result<(), ParseError> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };

        let transitions = self.build_transitions(&block)?;
        let prompt = block.prompt.or_else(|| prose_text(&block.prose));
        let Some(step) = self.steps.last_mut() else {
            return Ok(());
        };

        match block.owner {
            Owner::Step => {
                step.command = block.command;
                step.prompt = prompt;
                step.transitions = transitions;
                step.child_runbooks = block.children;
            }
            Owner::Substep => {
                if let Some(substep) = step.substeps.last_mut() {
                    substep.command = block.command;
                    substep.prompt = prompt;
                    substep.transitions = transitions;
                    substep.child_runbooks = block.children;
                }
            }
        }
        Ok(())
    }

    fn build_transitions(&mut self, block: &Block) -> Result<Option<Transitions>, ParseError> {
        let (pass, fail) = (block.pass.as_ref(), block.fail.as_ref());
        if pass.is_none() && fail.is_none() {
            return Ok(None);
        }

        let all = match (pass.and_then(|p| p.all), fail.and_then(|f| f.all)) {
            (Some(a), Some(b)) if a != b => {
                let line = fail.map(|f| f.line).unwrap_or_default();
                return Err(syntax(
                    line,
                    format!("{} mixes ALL and ANY aggregation", block.location),
                ));
            }
            (Some(all), _) | (None, Some(all)) => all,
            (None, None) => true,
        };

        let mut transitions = Transitions::default().with_all(all);
        match pass {
            Some(pass) => {
                transitions.pass = TransitionSide {
                    kind: pass.kind,
                    action: pass.action.clone(),
                }
            }
            None => self.errors.push(ValidationError::MissingTransitionSide {
                location: block.location.clone(),
                side: SideKind::Pass,
                line: fail.map(|f| f.line).unwrap_or_default(),
            }),
        }
        match fail {
            Some(fail) => {
                transitions.fail = TransitionSide {
                    kind: fail.kind,
                    action: fail.action.clone(),
                }
            }
            None => self.errors.push(ValidationError::MissingTransitionSide {
                location: block.location.clone(),
                side: SideKind::Fail,
                line: pass.map(|p| p.line).unwrap_or_default(),
            }),
        }
        Ok(Some(transitions))
    }

    fn finish(self, frontmatter: Option<Frontmatter>) -> (Workflow, Vec<ValidationError>) {
        let frontmatter = frontmatter.unwrap_or_default();
        let name = Some(frontmatter.name).filter(|n| !n.is_empty());
        let workflow = Workflow {
            title: self.title,
            description: prose_text(&self.preamble).or(frontmatter.description),
            name,
            version: frontmatter.version,
            tags: frontmatter.tags,
            steps: self.steps,
        };
        (workflow, self.errors)
    }
}

/// Text of a `#`-level heading, if `line` is exactly that level
fn heading(line: &str, level: usize) -> Option<&str> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if hashes != level {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim()).filter(|text| !text.is_empty())
}

fn fence_language(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix(FENCE)?;
    let lang = rest.trim_start_matches('`').split_whitespace().next();
    Some(lang.unwrap_or_default().to_ascii_lowercase())
}

fn is_fence_close(line: &str) -> bool {
    let line = line.trim();
    line.starts_with(FENCE) && line.trim_start_matches('`').is_empty()
}

/// Join prose lines, dropping blank lines at either end
fn prose_text(lines: &[String]) -> Option<String> {
    let start = lines.iter().position(|l| !l.trim().is_empty())?;
    let end = lines.iter().rposition(|l| !l.trim().is_empty())?;
    Some(lines[start..=end].join("\n").trim_end().to_string())
}

/// Split a header at the end of its id and strip one trailing `.`/`:`
fn split_id(text: &str) -> (&str, bool, &str) {
    let end = text
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(text.len());
    let (head, rest) = text.split_at(end);
    match head.strip_suffix(['.', ':']) {
        Some(id) => (id, true, rest),
        None => (head, false, rest),
    }
}

fn describe_id_error(kind: &str, text: &str, error: StepIdError) -> String {
    format!("invalid {} header '{}': {}", kind, text, error)
}

/// `<id>[.|:] <description>`
fn parse_step_header(text: &str) -> Result<(StepRef, String), String> {
    let (id, punctuated, rest) = split_id(text);
    let name: StepRef = id
        .parse()
        .map_err(|e| describe_id_error("step", text, e))?;
    let description = rest.trim();

    match name {
        StepRef::Next => Err("NEXT cannot name a step".to_string()),
        StepRef::Named(ref named) if !punctuated && !description.is_empty() => Err(format!(
            "named step '{}' must be followed by '.' or ':'",
            named
        )),
        _ => Ok((name, description.to_string())),
    }
}

struct SubstepHeader {
    parent: StepRef,
    id: SubstepRef,
    agent_type: Option<String>,
    description: String,
}

/// `<parent>.<id>[ (agent-type)][.|:] <description>`
fn parse_substep_header(text: &str) -> Result<SubstepHeader, String> {
    let (id, _, rest) = split_id(text);
    let Some((parent, sub)) = id.split_once('.') else {
        return Err(format!(
            "substep header '{}' must look like <step>.<substep>",
            text
        ));
    };
    let parent: StepRef = parent
        .parse()
        .map_err(|e| describe_id_error("substep", text, e))?;
    if parent == StepRef::Next {
        return Err("NEXT cannot name a step".to_string());
    }
    let id: SubstepRef = sub
        .parse()
        .map_err(|e| describe_id_error("substep", text, e))?;

    let mut rest = rest.trim_start();
    let mut agent_type = None;
    if let Some(inner) = rest.strip_prefix('(') {
        let close = inner
            .find(')')
            .ok_or_else(|| format!("unclosed agent type in '{}'", text))?;
        let agent = inner[..close].trim();
        if agent.is_empty() {
            return Err(format!("empty agent type in '{}'", text));
        }
        agent_type = Some(agent.to_string());
        rest = &inner[close + 1..];
    }
    let rest = rest.strip_prefix(['.', ':']).unwrap_or(rest);

    Ok(SubstepHeader {
        parent,
        id,
        agent_type,
        description: rest.trim().to_string(),
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
