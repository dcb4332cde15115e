// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action string grammar
//!
//! ```text
//! action   := RETRY [n] [fallback | "msg"] | fallback
//! fallback := CONTINUE | COMPLETE ["msg"] | STOP ["msg"] | GOTO target | NEXT
//! ```
//!
//! `NEXT` on its own is shorthand for `GOTO NEXT`. A `RETRY` without a
//! fallback stops once retries run out.

use std::iter::Peekable;
use std::vec::IntoIter;
use stepwise_core::{Action, NonRetryAction, StepId};
use thiserror::Error;

/// Why an action string was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("missing action")]
    Empty,
    #[error("unterminated quoted message")]
    UnterminatedQuote,
    #[error("unknown action '{0}'")]
    Unknown(String),
    #[error("GOTO requires a target")]
    MissingTarget,
    #[error("invalid GOTO target '{0}'")]
    InvalidTarget(String),
    #[error("RETRY count must be at least 1")]
    ZeroRetries,
    #[error("RETRY cannot fall back to another RETRY")]
    NestedRetry,
    #[error("unexpected '{0}' after action")]
    Trailing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => word.clone(),
            Token::Quoted(text) => format!("\"{}\"", text),
        }
    }

    fn keyword(&self) -> Option<String> {
        match self {
            Token::Word(word) => Some(word.to_ascii_uppercase()),
            Token::Quoted(_) => None,
        }
    }
}

type Tokens = Peekable<IntoIter<Token>>;

/// Parse the right-hand side of a `PASS:`/`FAIL:` line
pub fn parse_action(text: &str) -> Result<Action, ActionError> {
    let mut tokens = tokenize(text)?.into_iter().peekable();
    let first = tokens.next().ok_or(ActionError::Empty)?;

    let action = if first.keyword().as_deref() == Some("RETRY") {
        parse_retry(&mut tokens)?
    } else {
        Action::NonRetry(parse_non_retry(first, &mut tokens)?)
    };

    match tokens.next() {
        Some(extra) => Err(ActionError::Trailing(extra.describe())),
        None => Ok(action),
    }
}

fn parse_retry(tokens: &mut Tokens) -> Result<Action, ActionError> {
    let max = match tokens.peek() {
        Some(Token::Word(word)) if word.chars().all(|c| c.is_ascii_digit()) => {
            let max = word
                .parse::<u32>()
                .map_err(|_| ActionError::Unknown(word.clone()))?;
            tokens.next();
            if max == 0 {
                return Err(ActionError::ZeroRetries);
            }
            max
        }
        _ => 1,
    };

    let then = match tokens.next() {
        None => NonRetryAction::Stop { message: None },
        Some(Token::Quoted(message)) => NonRetryAction::Stop {
            message: Some(message),
        },
        Some(token) if token.keyword().as_deref() == Some("RETRY") => {
            return Err(ActionError::NestedRetry)
        }
        Some(token) => parse_non_retry(token, tokens)?,
    };
    Ok(Action::retry(max, then))
}

fn parse_non_retry(first: Token, tokens: &mut Tokens) -> Result<NonRetryAction, ActionError> {
    let Some(keyword) = first.keyword() else {
        return Err(ActionError::Unknown(first.describe()));
    };

    match keyword.as_str() {
        "CONTINUE" => Ok(NonRetryAction::Continue),
        "COMPLETE" => Ok(NonRetryAction::Complete {
            message: take_message(tokens),
        }),
        "STOP" => Ok(NonRetryAction::Stop {
            message: take_message(tokens),
        }),
        "NEXT" => Ok(NonRetryAction::goto(StepId::next())),
        "GOTO" => {
            let target = match tokens.next() {
                Some(Token::Word(target)) => target,
                Some(other) => return Err(ActionError::InvalidTarget(other.describe())),
                None => return Err(ActionError::MissingTarget),
            };
            parse_target(&target).map(NonRetryAction::goto)
        }
        _ => Err(ActionError::Unknown(first.describe())),
    }
}

fn parse_target(text: &str) -> Result<StepId, ActionError> {
    if text.eq_ignore_ascii_case("NEXT") {
        return Ok(StepId::next());
    }
    StepId::parse(text).ok_or_else(|| ActionError::InvalidTarget(text.to_string()))
}

fn take_message(tokens: &mut Tokens) -> Option<String> {
    match tokens.peek() {
        Some(Token::Quoted(_)) => match tokens.next() {
            Some(Token::Quoted(message)) => Some(message),
            _ => None,
        },
        _ => None,
    }
}

/// Split on whitespace, keeping `"..."` (with `\"` and `\\` escapes) as one token
fn tokenize(text: &str) -> Result<Vec<Token>, ActionError> {
    let mut tokens = Vec::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut quoted = String::new();
            loop {
                match chars.next() {
                    None => return Err(ActionError::UnterminatedQuote),
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some(escaped) => quoted.push(escaped),
                        None => return Err(ActionError::UnterminatedQuote),
                    },
                    Some(other) => quoted.push(other),
                }
            }
            tokens.push(Token::Quoted(quoted));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    Ok(tokens)
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
