// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Persistence of activation state across process boundaries.
//!
//! Two interchangeable strategies back a session: a shared key-value file on
//! disk, or the activation map compressed and encoded into numbered
//! environment variables so that the inherited environment itself is the
//! durable medium.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::env::Environ;
use crate::error::{Error, Result};
use crate::{SESSION_DATA_PREFIX, SESSION_VAR, STORE_FILE_VAR};

#[cfg(test)]
#[path = "./store_test.rs"]
mod store_test;

/// Largest value safely assignable to a single variable by the platform's
/// shells.
#[cfg(windows)]
pub const MAX_VAR_SIZE: usize = 1000;
#[cfg(target_os = "macos")]
pub const MAX_VAR_SIZE: usize = 4000;
#[cfg(all(not(windows), not(target_os = "macos")))]
pub const MAX_VAR_SIZE: usize = 120_000;

/// Everything the session persists for one active package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivationRecord {
    pub name: String,
    pub version: String,
    pub hash: String,
    /// Descriptor directory, kept for replaying relative path values.
    pub root: Option<PathBuf>,
    /// The mutation log, keyed by variable name.
    pub actions: BTreeMap<String, Vec<Action>>,
    /// Requirement specs loaded before this package, as requested.
    pub requires: Vec<String>,
    /// Subpackage specs loaded after this package, as requested.
    pub subpackages: Vec<String>,
}

impl ActivationRecord {
    pub fn fullname(&self) -> String {
        crate::package::join_name(&self.name, &self.version)
    }
}

/// How the session found its persistent state at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    /// No marker in the inherited environment: a brand new session.
    New,
    /// A marker from a parent process: storage is taken over in place.
    Child,
    /// The marker names this very session: already initialized.
    Done,
}

/// Classify the inherited session marker against our own token.
pub fn init_kind(env: &Environ, token: &str) -> InitKind {
    match env.get(SESSION_VAR) {
        None => InitKind::New,
        Some(owner) if owner != token => InitKind::Child,
        Some(_) => InitKind::Done,
    }
}

/// Storage strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Encode the activation map into environment variables.
    #[default]
    Env,
    /// Keep the activation map in a shared session file.
    File,
}

impl StorageKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "env" => Some(Self::Env),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Dictionary-style access to the persisted activation records.
pub trait SessionStorage {
    fn init_kind(&self) -> InitKind;
    fn get(&self, name: &str) -> Option<&ActivationRecord>;
    fn contains(&self, name: &str) -> bool;
    fn names(&self) -> Vec<String>;
    fn insert(&mut self, env: &mut Environ, record: ActivationRecord) -> Result<()>;
    fn remove(&mut self, env: &mut Environ, name: &str) -> Result<Option<ActivationRecord>>;
    /// Erase every session marker and storage artifact.
    fn teardown(&mut self, env: &mut Environ) -> Result<()>;
}

/// Open the selected storage strategy, claiming the session marker.
pub fn open(
    kind: StorageKind,
    token: &str,
    env: &mut Environ,
) -> Result<Box<dyn SessionStorage>> {
    match kind {
        StorageKind::Env => Ok(Box::new(EnvStore::open(token, env)?)),
        StorageKind::File => Ok(Box::new(FileStore::open(token, env, &std::env::temp_dir())?)),
    }
}

fn claim_session(env: &mut Environ, token: &str) -> InitKind {
    let kind = init_kind(env, token);
    match kind {
        InitKind::New => tracing::info!(token, "opening new session"),
        InitKind::Child => tracing::info!(token, "inheriting session from parent process"),
        InitKind::Done => tracing::debug!(token, "session already initialized"),
    }
    env.set(SESSION_VAR, token);
    kind
}

// ---------------------------------------------------------------------------
// Environment-encoded strategy
// ---------------------------------------------------------------------------

/// Persists the activation map in `SETPKG_SESSION_DATA_<n>` variables.
///
/// The map is serialized with serde_json, zlib-compressed and hex-encoded,
/// then split across numbered variables each below [`MAX_VAR_SIZE`] so the
/// shell can carry them.
pub struct EnvStore {
    init: InitKind,
    packages: BTreeMap<String, ActivationRecord>,
    max_size: usize,
}

impl EnvStore {
    pub fn open(token: &str, env: &mut Environ) -> Result<Self> {
        Self::open_with_max(token, env, MAX_VAR_SIZE)
    }

    fn open_with_max(token: &str, env: &mut Environ, max_size: usize) -> Result<Self> {
        let init = claim_session(env, token);
        let packages = read_chunks(env)?;
        Ok(Self {
            init,
            packages,
            max_size,
        })
    }

    fn flush(&self, env: &mut Environ) -> Result<()> {
        write_chunks(env, &self.packages, self.max_size)
    }
}

impl SessionStorage for EnvStore {
    fn init_kind(&self) -> InitKind {
        self.init
    }

    fn get(&self, name: &str) -> Option<&ActivationRecord> {
        self.packages.get(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    fn insert(&mut self, env: &mut Environ, record: ActivationRecord) -> Result<()> {
        self.packages.insert(record.name.clone(), record);
        self.flush(env)
    }

    fn remove(&mut self, env: &mut Environ, name: &str) -> Result<Option<ActivationRecord>> {
        let removed = self.packages.remove(name);
        if removed.is_some() {
            self.flush(env)?;
        }
        Ok(removed)
    }

    fn teardown(&mut self, env: &mut Environ) -> Result<()> {
        self.packages.clear();
        clear_chunks(env, 0);
        env.remove(SESSION_VAR);
        Ok(())
    }
}

fn chunk_var(index: usize) -> String {
    format!("{SESSION_DATA_PREFIX}{index}")
}

fn read_chunks(env: &Environ) -> Result<BTreeMap<String, ActivationRecord>> {
    let mut numbered: Vec<(usize, &str)> = Vec::new();
    for (name, value) in env.iter() {
        if let Some(suffix) = name.strip_prefix(SESSION_DATA_PREFIX) {
            let index = suffix.parse::<usize>().map_err(|_| {
                Error::CorruptSession(format!("bad session data variable name: {name}"))
            })?;
            numbered.push((index, value));
        }
    }
    if numbered.is_empty() {
        return Ok(BTreeMap::new());
    }
    numbered.sort_by_key(|(index, _)| *index);
    if numbered.last().map(|(index, _)| *index) != Some(numbered.len() - 1) {
        return Err(Error::CorruptSession(
            "session data variables are not sequential".to_string(),
        ));
    }

    let encoded: String = numbered.into_iter().map(|(_, value)| value).collect();
    let compressed = HEXLOWER
        .decode(encoded.as_bytes())
        .map_err(|err| Error::CorruptSession(format!("invalid session data encoding: {err}")))?;
    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|err| Error::CorruptSession(format!("session data does not decompress: {err}")))?;
    serde_json::from_slice(&json)
        .map_err(|err| Error::CorruptSession(format!("session data does not parse: {err}")))
}

fn write_chunks(
    env: &mut Environ,
    packages: &BTreeMap<String, ActivationRecord>,
    max_size: usize,
) -> Result<()> {
    let json = serde_json::to_vec(packages)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let encoded = HEXLOWER.encode(&encoder.finish()?);

    let mut count = 0;
    for (index, chunk) in encoded.as_bytes().chunks(max_size).enumerate() {
        // hex output is plain ASCII
        env.set(chunk_var(index), String::from_utf8_lossy(chunk));
        count = index + 1;
    }
    clear_chunks(env, count);
    Ok(())
}

/// Remove stale numbered variables from `start` upward.
fn clear_chunks(env: &mut Environ, start: usize) {
    let mut index = start;
    while env.remove(&chunk_var(index)).is_some() {
        index += 1;
    }
}

// ---------------------------------------------------------------------------
// External file strategy
// ---------------------------------------------------------------------------

/// Metadata header of the session store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub created: DateTime<Utc>,
    pub setpkg_version: String,
    pub hostname: String,
    /// Token of the session owning this copy of the file.
    pub session: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    meta: StoreMeta,
    packages: BTreeMap<String, ActivationRecord>,
}

impl StoreDocument {
    fn new(token: &str) -> Self {
        Self {
            meta: StoreMeta {
                created: Utc::now(),
                setpkg_version: env!("CARGO_PKG_VERSION").to_string(),
                hostname: hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "unknown".to_string()),
                session: token.to_string(),
            },
            packages: BTreeMap::new(),
        }
    }
}

/// Persists the activation map in a session file shared by all processes
/// descended from one parent shell.
///
/// When a child process with a different session token opens the store, the
/// file is duplicated under the child's token and the `SETPKG_STORE` marker
/// repointed, so sibling sessions cannot corrupt each other.
pub struct FileStore {
    init: InitKind,
    path: PathBuf,
    document: StoreDocument,
}

impl FileStore {
    pub fn open(token: &str, env: &mut Environ, dir: &Path) -> Result<Self> {
        let init = claim_session(env, token);
        let our_path = dir.join(format!("setpkg_session_{token}.json"));

        let (path, document) = match env.get(STORE_FILE_VAR).map(str::to_string) {
            Some(existing) => {
                let existing = PathBuf::from(existing);
                let mut document = Self::load_document(&existing)?;
                if document.meta.session != token {
                    tracing::info!(
                        from = %existing.display(),
                        to = %our_path.display(),
                        "copying session store for new process"
                    );
                    document.meta.session = token.to_string();
                    (our_path, document)
                } else {
                    (existing, document)
                }
            }
            None => (our_path, StoreDocument::new(token)),
        };

        env.set(STORE_FILE_VAR, path.to_string_lossy());
        let store = Self {
            init,
            path,
            document,
        };
        store.flush()?;
        Ok(store)
    }

    fn load_document(path: &Path) -> Result<StoreDocument> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                Error::CorruptSession(format!(
                    "session store {} does not parse: {err}",
                    path.display()
                ))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "session store file is missing, starting empty"
                );
                Ok(StoreDocument::new(""))
            }
            Err(err) => Err(Error::ReadFailed {
                path: path.to_path_buf(),
                error: err,
            }),
        }
    }

    fn flush(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.document)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl SessionStorage for FileStore {
    fn init_kind(&self) -> InitKind {
        self.init
    }

    fn get(&self, name: &str) -> Option<&ActivationRecord> {
        self.document.packages.get(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.document.packages.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.document.packages.keys().cloned().collect()
    }

    fn insert(&mut self, _env: &mut Environ, record: ActivationRecord) -> Result<()> {
        self.document.packages.insert(record.name.clone(), record);
        self.flush()
    }

    fn remove(&mut self, _env: &mut Environ, name: &str) -> Result<Option<ActivationRecord>> {
        let removed = self.document.packages.remove(name);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    fn teardown(&mut self, env: &mut Environ) -> Result<()> {
        self.document.packages.clear();
        if self.path.is_file() {
            std::fs::remove_file(&self.path)?;
        }
        env.remove(STORE_FILE_VAR);
        env.remove(SESSION_VAR);
        Ok(())
    }
}
