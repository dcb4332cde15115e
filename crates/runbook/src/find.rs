// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook file discovery

use crate::parser::{parse_workflow_file, ParseOptions};
use crate::types::Workflow;
use std::path::{Path, PathBuf};
use thiserror::Error;

const RUNBOOK_SUFFIX: &str = ".runbook.md";

/// Errors from runbook directory scanning
#[derive(Debug, Error)]
pub enum FindError {
    #[error("runbook '{0}' is defined by more than one file")]
    Duplicate(String),
    #[error("runbook '{name}' not found; {count} runbook(s) skipped due to errors:\n{details}")]
    NotFoundSkipped {
        name: String,
        count: usize,
        details: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A runbook found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct FoundRunbook {
    /// Frontmatter `name`, or the file name without `.runbook.md`
    pub name: String,
    pub path: PathBuf,
    pub workflow: Workflow,
}

/// Name a runbook by its frontmatter, falling back to the file name
pub fn runbook_name(path: &Path, workflow: &Workflow) -> String {
    if let Some(name) = &workflow.name {
        return name.clone();
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .strip_suffix(RUNBOOK_SUFFIX)
        .unwrap_or(&file_name)
        .to_string()
}

/// Scan `dir` recursively and parse every `*.runbook.md`.
/// Returns runbooks sorted by name.
/// Skips files that fail to read or validate (logs warnings).
pub fn find_runbooks(dir: &Path) -> Result<Vec<FoundRunbook>, FindError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for path in collect_runbook_files(dir)? {
        match parse_workflow_file(&path, ParseOptions::default()) {
            Ok(workflow) => found.push(FoundRunbook {
                name: runbook_name(&path, &workflow),
                path,
                workflow,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping invalid runbook");
            }
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    Ok(found)
}

/// Scan `dir` for the single runbook called `name`
pub fn find_runbook(dir: &Path, name: &str) -> Result<Option<FoundRunbook>, FindError> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut found: Option<FoundRunbook> = None;
    let mut skipped: Vec<(PathBuf, String)> = Vec::new();
    for path in collect_runbook_files(dir)? {
        let workflow = match parse_workflow_file(&path, ParseOptions::default()) {
            Ok(workflow) => workflow,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping invalid runbook");
                skipped.push((path, e.to_string()));
                continue;
            }
        };
        if runbook_name(&path, &workflow) != name {
            continue;
        }
        if found.is_some() {
            return Err(FindError::Duplicate(name.to_string()));
        }
        found = Some(FoundRunbook {
            name: name.to_string(),
            path,
            workflow,
        });
    }
    if found.is_none() && !skipped.is_empty() {
        let details = skipped
            .iter()
            .map(|(p, e)| format!("  {}: {}", p.display(), e.trim_end()))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(FindError::NotFoundSkipped {
            name: name.to_string(),
            count: skipped.len(),
            details,
        });
    }
    Ok(found)
}

/// Recursively collect `*.runbook.md` files, skipping hidden directories
fn collect_runbook_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)?.flatten() {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if path.is_dir() {
                if !hidden {
                    stack.push(path);
                }
            } else if is_runbook_file(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn is_runbook_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(RUNBOOK_SUFFIX) && n.len() > RUNBOOK_SUFFIX.len())
}

#[cfg(test)]
#[path = "find_tests.rs"]
mod tests;
