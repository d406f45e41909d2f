// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

fn record(name: &str, version: &str) -> ActivationRecord {
    let mut actions = BTreeMap::new();
    actions.insert(
        format!("{}{}", crate::VER_PREFIX, name),
        vec![Action::Set {
            value: Some(format!("{version},deadbeef")),
            prev: None,
        }],
    );
    ActivationRecord {
        name: name.to_string(),
        version: version.to_string(),
        hash: "deadbeef".to_string(),
        root: None,
        actions,
        requires: vec!["python-2.5".to_string()],
        subpackages: vec!["djv".to_string()],
    }
}

#[rstest]
fn test_init_kind_classification() {
    let mut env = Environ::new();
    assert_eq!(init_kind(&env, "100"), InitKind::New);
    env.set(SESSION_VAR, "99");
    assert_eq!(init_kind(&env, "100"), InitKind::Child);
    env.set(SESSION_VAR, "100");
    assert_eq!(init_kind(&env, "100"), InitKind::Done);
}

#[rstest]
fn test_open_claims_the_session_marker() {
    let mut env = Environ::new();
    let store = EnvStore::open("100", &mut env).unwrap();
    assert_eq!(store.init_kind(), InitKind::New);
    assert_eq!(env.get(SESSION_VAR), Some("100"));
}

#[rstest]
fn test_chunked_encoding_round_trip() {
    let mut env = Environ::new();
    let mut packages = BTreeMap::new();
    packages.insert("nuke".to_string(), record("nuke", "6.0v6"));
    packages.insert("python".to_string(), record("python", "2.5"));

    // force several chunks with a tiny limit
    write_chunks(&mut env, &packages, 32).unwrap();
    let chunks: Vec<&str> = env
        .names()
        .filter(|n| n.starts_with(SESSION_DATA_PREFIX))
        .collect();
    assert!(chunks.len() > 1, "expected multiple chunks, got {chunks:?}");
    assert!(env.contains(&format!("{SESSION_DATA_PREFIX}0")));

    let read = read_chunks(&env).unwrap();
    assert_eq!(read, packages);
}

#[rstest]
fn test_rewriting_smaller_data_drops_stale_chunks() {
    let mut env = Environ::new();
    let mut packages = BTreeMap::new();
    for i in 0..8 {
        packages.insert(format!("pkg{i}"), record(&format!("pkg{i}"), "1.0"));
    }
    write_chunks(&mut env, &packages, 64).unwrap();
    let many = env
        .names()
        .filter(|n| n.starts_with(SESSION_DATA_PREFIX))
        .count();

    packages.clear();
    packages.insert("one".to_string(), record("one", "1.0"));
    write_chunks(&mut env, &packages, 64).unwrap();
    let few = env
        .names()
        .filter(|n| n.starts_with(SESSION_DATA_PREFIX))
        .count();

    assert!(few < many);
    assert_eq!(read_chunks(&env).unwrap(), packages);
}

#[rstest]
fn test_non_sequential_chunks_are_corrupt() {
    let mut env = Environ::new();
    env.set(format!("{SESSION_DATA_PREFIX}0"), "abcd");
    env.set(format!("{SESSION_DATA_PREFIX}2"), "ef01");
    assert!(matches!(
        read_chunks(&env),
        Err(Error::CorruptSession(_))
    ));
}

#[rstest]
fn test_env_store_insert_get_remove() {
    let mut env = Environ::new();
    let mut store = EnvStore::open("100", &mut env).unwrap();
    store.insert(&mut env, record("nuke", "6.0v6")).unwrap();
    assert!(store.contains("nuke"));
    assert_eq!(store.get("nuke").unwrap().version, "6.0v6");
    assert_eq!(store.names(), vec!["nuke".to_string()]);

    // a second store over the same environment sees the same state
    let mut env2 = env.clone();
    let reopened = EnvStore::open("100", &mut env2).unwrap();
    assert_eq!(reopened.init_kind(), InitKind::Done);
    assert!(reopened.contains("nuke"));

    store.remove(&mut env, "nuke").unwrap();
    assert!(!store.contains("nuke"));
    assert!(!env.contains(&format!("{SESSION_DATA_PREFIX}0")) || read_chunks(&env).unwrap().is_empty());
}

#[rstest]
fn test_env_store_teardown_clears_markers() {
    let mut env = Environ::new();
    let mut store = EnvStore::open("100", &mut env).unwrap();
    store.insert(&mut env, record("nuke", "6.0v6")).unwrap();
    store.teardown(&mut env).unwrap();
    assert!(!env.contains(SESSION_VAR));
    assert!(env.names().all(|n| !n.starts_with(SESSION_DATA_PREFIX)));
}

#[rstest]
fn test_file_store_persists_across_opens() {
    let tmp = TempDir::new().unwrap();
    let mut env = Environ::new();
    {
        let mut store = FileStore::open("100", &mut env, tmp.path()).unwrap();
        store.insert(&mut env, record("nuke", "6.0v6")).unwrap();
    }
    assert!(env.get(STORE_FILE_VAR).is_some());

    let mut env2 = env.clone();
    let store = FileStore::open("100", &mut env2, tmp.path()).unwrap();
    assert_eq!(store.init_kind(), InitKind::Done);
    assert_eq!(store.get("nuke").unwrap().version, "6.0v6");
}

#[rstest]
fn test_file_store_copies_on_process_divergence() {
    let tmp = TempDir::new().unwrap();
    let mut parent_env = Environ::new();
    {
        let mut store = FileStore::open("100", &mut parent_env, tmp.path()).unwrap();
        store.insert(&mut parent_env, record("nuke", "6.0v6")).unwrap();
    }
    let parent_file = parent_env.get(STORE_FILE_VAR).unwrap().to_string();

    // a subshell inherits the environment but runs under a new token
    let mut child_env = parent_env.clone();
    let store = FileStore::open("200", &mut child_env, tmp.path()).unwrap();
    assert_eq!(store.init_kind(), InitKind::Child);
    let child_file = child_env.get(STORE_FILE_VAR).unwrap().to_string();
    assert_ne!(parent_file, child_file);
    assert!(child_file.contains("200"));
    // activation state carried over into the copy
    assert_eq!(store.get("nuke").unwrap().version, "6.0v6");
    // the parent's file is untouched
    assert!(std::path::Path::new(&parent_file).is_file());
}

#[rstest]
fn test_file_store_teardown_removes_file_and_markers() {
    let tmp = TempDir::new().unwrap();
    let mut env = Environ::new();
    let mut store = FileStore::open("100", &mut env, tmp.path()).unwrap();
    let path = env.get(STORE_FILE_VAR).unwrap().to_string();
    store.teardown(&mut env).unwrap();
    assert!(!std::path::Path::new(&path).exists());
    assert!(!env.contains(STORE_FILE_VAR));
    assert!(!env.contains(SESSION_VAR));
}
