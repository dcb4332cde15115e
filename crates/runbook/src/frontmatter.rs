// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML frontmatter extraction
//!
//! A runbook may open with a `---` delimited YAML block. Anything malformed
//! is treated as "no frontmatter" and the original text is returned as-is.

use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

const DELIMITER: &str = "---";

// Frontmatter name pattern - this is a constant valid pattern
#[allow(clippy::expect_used)]
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9-]+$").expect("constant regex pattern is valid"));

/// Validated frontmatter fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    /// Every other top-level key, untouched
    pub extra: Mapping,
}

/// Split off and validate frontmatter
///
/// Returns the frontmatter and the left-trimmed body on success, or `None`
/// and the unchanged input when the block is missing, unterminated, not
/// valid YAML, or has no valid `name`.
pub fn extract_frontmatter(text: &str) -> (Option<Frontmatter>, &str) {
    let Some((yaml, rest)) = split(text) else {
        return (None, text);
    };
    let Some(mapping) = parse_mapping(yaml) else {
        return (None, text);
    };
    match validate(mapping) {
        Some(frontmatter) => (Some(frontmatter), rest.trim_start()),
        None => (None, text),
    }
}

/// Split off frontmatter without validating any field
///
/// Used by tooling that reads extension keys. Same fallback rule as
/// [`extract_frontmatter`] for missing or unparseable blocks.
pub fn extract_raw_frontmatter(text: &str) -> (Option<Mapping>, &str) {
    match split(text).and_then(|(yaml, rest)| Some((parse_mapping(yaml)?, rest))) {
        Some((mapping, rest)) => (Some(mapping), rest.trim_start()),
        None => (None, text),
    }
}

/// Whether `name` is acceptable as a frontmatter `name`
pub fn is_valid_runbook_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Returns the YAML between the delimiters and everything after the closing one
fn split(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((&text[yaml_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_mapping(yaml: &str) -> Option<Mapping> {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => Some(mapping),
        Ok(Value::Null) => Some(Mapping::new()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparseable frontmatter");
            None
        }
    }
}

fn validate(mut mapping: Mapping) -> Option<Frontmatter> {
    let name = match mapping.remove("name")? {
        Value::String(name) if is_valid_runbook_name(&name) => name,
        _ => return None,
    };

    let description = match mapping.remove("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(description)) => Some(description),
        Some(_) => return None,
    };

    let version = match mapping.remove("version") {
        None | Some(Value::Null) => None,
        Some(Value::String(version)) => Some(version),
        Some(Value::Number(version)) => Some(version.to_string()),
        Some(_) => return None,
    };

    let tags = match mapping.remove("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(tag) => Some(tag),
                Value::Number(tag) => Some(tag.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?,
        Some(_) => return None,
    };

    Some(Frontmatter {
        name,
        description,
        version,
        tags,
        extra: mapping,
    })
}

#[cfg(test)]
#[path = "frontmatter_tests.rs"]
mod tests;
