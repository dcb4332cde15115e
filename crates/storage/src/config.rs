// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store location resolution

use crate::error::StateError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the state directory
pub const STATE_DIR_ENV: &str = "STEPWISE_STATE_DIR";

/// How long a writer waits for the store lock before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Where persisted runs and the session live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory for this project's state
    pub root: PathBuf,
    /// One `<id>.json` per workflow run
    pub runs_dir: PathBuf,
    /// Shared session document
    pub session_path: PathBuf,
    /// Advisory lock guarding read-modify-write cycles
    pub lock_path: PathBuf,
    /// Upper bound on waiting for `lock_path`
    pub lock_timeout: Duration,
}

impl StoreConfig {
    /// Use an explicit root directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            runs_dir: root.join("runs"),
            session_path: root.join("session.json"),
            lock_path: root.join("store.lock"),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            root,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Create config for a project from the process environment
    pub fn for_project(project_root: &Path) -> Result<Self, StateError> {
        Self::for_project_with(project_root, |key| std::env::var(key).ok())
    }

    /// Create config for a project using `lookup` for environment variables
    pub fn for_project_with(
        project_root: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StateError> {
        let canonical = project_root
            .canonicalize()
            .map_err(|source| StateError::StateDir {
                path: project_root.to_path_buf(),
                source,
            })?;

        let hash = project_hash(&canonical);
        let root = state_dir(&lookup)?.join("projects").join(hash);
        Ok(Self::at(root))
    }

    /// Path of the state file for run `id`
    pub fn run_path(&self, id: &str) -> PathBuf {
        self.runs_dir.join(format!("{}.json", id))
    }
}

/// Get the state directory for stepwise
fn state_dir(lookup: &impl Fn(&str) -> Option<String>) -> Result<PathBuf, StateError> {
    if let Some(dir) = lookup(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Some(xdg) = lookup("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("stepwise"));
    }

    let home = lookup("HOME").ok_or(StateError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/stepwise"))
}

/// Compute project hash for a unique state directory
fn project_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // First 16 chars of hex digest
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
