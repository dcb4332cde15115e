// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn explicit_root_derives_paths() {
    let config = StoreConfig::at("/state");
    assert_eq!(config.runs_dir, PathBuf::from("/state/runs"));
    assert_eq!(config.session_path, PathBuf::from("/state/session.json"));
    assert_eq!(config.lock_path, PathBuf::from("/state/store.lock"));
    assert_eq!(config.run_path("abc"), PathBuf::from("/state/runs/abc.json"));
}

#[test]
fn override_wins_over_xdg_and_home() {
    let project = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_project_with(
        project.path(),
        env(&[
            (STATE_DIR_ENV, "/override"),
            ("XDG_STATE_HOME", "/xdg"),
            ("HOME", "/home/me"),
        ]),
    )
    .unwrap();
    assert!(config.root.starts_with("/override/projects"));
}

#[test]
fn xdg_state_home_is_used_before_home() {
    let project = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_project_with(
        project.path(),
        env(&[("XDG_STATE_HOME", "/xdg"), ("HOME", "/home/me")]),
    )
    .unwrap();
    assert!(config.root.starts_with("/xdg/stepwise/projects"));
}

#[test]
fn falls_back_to_home() {
    let project = tempfile::tempdir().unwrap();
    let config =
        StoreConfig::for_project_with(project.path(), env(&[("HOME", "/home/me")])).unwrap();
    assert!(config
        .root
        .starts_with("/home/me/.local/state/stepwise/projects"));
}

#[test]
fn no_home_is_an_error() {
    let project = tempfile::tempdir().unwrap();
    let err = StoreConfig::for_project_with(project.path(), env(&[])).unwrap_err();
    assert_eq!(err.code(), "E_STATE_DIR");
}

#[test]
fn missing_project_is_an_error() {
    let err = StoreConfig::for_project_with(
        Path::new("/definitely/not/here"),
        env(&[("HOME", "/home/me")]),
    )
    .unwrap_err();
    assert!(matches!(err, StateError::StateDir { .. }));
}

#[test]
fn project_directory_is_stable_and_distinct() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let lookup = env(&[(STATE_DIR_ENV, "/s")]);

    let first = StoreConfig::for_project_with(a.path(), &lookup).unwrap();
    let again = StoreConfig::for_project_with(a.path(), &lookup).unwrap();
    let other = StoreConfig::for_project_with(b.path(), &lookup).unwrap();

    assert_eq!(first, again);
    assert_ne!(first.root, other.root);
    let hash = first.root.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}
