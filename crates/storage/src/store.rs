// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON documents on disk
//!
//! Writes go to a temp file that is renamed over the target, so readers
//! never observe a half-written document. Read-modify-write cycles hold an
//! exclusive advisory lock on a shared lock file.

use crate::error::StateError;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_POLL_INITIAL: Duration = Duration::from_millis(5);
const LOCK_POLL_MAX: Duration = Duration::from_millis(200);

/// Exclusive advisory lock, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Wait up to `timeout` for the lock at `path`
    ///
    /// Polls with a capped backoff. A holder that never releases surfaces as
    /// `StateError::Lock` with a `TimedOut` source.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, StateError> {
        let start = Instant::now();
        let mut delay = LOCK_POLL_INITIAL;
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                tracing::debug!(
                    path = %path.display(),
                    waited_ms = start.elapsed().as_millis() as u64,
                    "store lock acquired"
                );
                return Ok(lock);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                tracing::warn!(
                    path = %path.display(),
                    timeout_ms = timeout.as_millis() as u64,
                    "store lock timed out"
                );
                return Err(StateError::Lock {
                    path: path.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("still held after {}ms", timeout.as_millis()),
                    ),
                });
            }
            std::thread::sleep(delay.min(timeout - elapsed));
            delay = (delay * 2).min(LOCK_POLL_MAX);
        }
    }

    /// Take the lock only if nobody else holds it
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, StateError> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|source| StateError::Lock {
                path: path.to_path_buf(),
                source,
            })?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(source) => Err(StateError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), StateError> {
    fs::create_dir_all(dir).map_err(|source| StateError::StateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Read a JSON document; `None` when the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StateError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Atomically replace `path` with `value` as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let write_err = |source| StateError::Write {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp).map_err(write_err)?;
        file.write_all(&json).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
    }
    fs::rename(&tmp, path).map_err(write_err)
}

/// Remove a document; returns false if it was already gone
pub fn remove(path: &Path) -> Result<bool, StateError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StateError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
