// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Markdown runbook parsing, validation and rendering

mod action;
mod find;
mod frontmatter;
mod parser;
mod render;
mod types;
mod validator;

pub use action::{parse_action, ActionError};
pub use find::{find_runbook, find_runbooks, runbook_name, FindError, FoundRunbook};
pub use frontmatter::{
    extract_frontmatter, extract_raw_frontmatter, is_valid_runbook_name, Frontmatter,
};
pub use parser::{parse_workflow, parse_workflow_file, parse_workflow_with, ParseError, ParseOptions};
pub use render::render_workflow;
pub use types::{Command, HasTransitions, Step, Substep, Workflow};
pub use validator::{validate_steps, ValidationError, ValidationErrors};
