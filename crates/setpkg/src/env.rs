// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Primitive, reversible operations on an injectable environment map.
//!
//! Nothing in this module touches the process environment; every operation
//! takes the [`Environ`] it works on, so sessions and tests stay isolated.

use std::collections::BTreeMap;
use std::path::Path;

#[cfg(test)]
#[path = "./env_test.rs"]
mod env_test;

/// Platform separator for list-valued variables such as `PATH`.
#[cfg(windows)]
pub const LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const LIST_SEPARATOR: char = ':';

/// A key-ordered environment variable map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environ(BTreeMap<String, String>);

impl Environ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Variable names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Compute what changed relative to a base snapshot.
    pub fn diff(&self, base: &Environ) -> EnvChanges {
        let mut changed = BTreeMap::new();
        for (name, value) in self.iter() {
            if base.get(name) != Some(value) {
                changed.insert(name.to_string(), value.to_string());
            }
        }
        let removed = base
            .names()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect();
        EnvChanges { changed, removed }
    }
}

impl FromIterator<(String, String)> for Environ {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Difference between two environment snapshots, for shell emission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvChanges {
    /// Variables that were added or modified.
    pub changed: BTreeMap<String, String>,
    /// Variables that were deleted.
    pub removed: Vec<String>,
}

impl EnvChanges {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Flags accepted by every ledger operation.
#[derive(Debug, Clone, Copy)]
pub struct OpFlags<'a> {
    /// Expand `$VAR`/`${VAR}` and `~` in the value before applying.
    pub expand: bool,
    /// Skip insertion when an expanded-form match is already present.
    pub no_dupes: bool,
    /// Root directory for resolving relative-looking path values.
    pub root: Option<&'a Path>,
    /// List separator for this variable.
    pub sep: char,
}

impl Default for OpFlags<'_> {
    fn default() -> Self {
        Self {
            expand: true,
            no_dupes: false,
            root: None,
            sep: LIST_SEPARATOR,
        }
    }
}

impl<'a> OpFlags<'a> {
    /// Flags for replaying recorded actions: values are already concrete.
    pub fn raw(sep: char) -> Self {
        Self {
            expand: false,
            no_dupes: false,
            root: None,
            sep,
        }
    }

    pub fn with_root(mut self, root: Option<&'a Path>) -> Self {
        self.root = root;
        self
    }

    pub fn with_sep(mut self, sep: char) -> Self {
        self.sep = sep;
        self
    }

    pub fn with_no_dupes(mut self, no_dupes: bool) -> Self {
        self.no_dupes = no_dupes;
        self
    }
}

/// Expand `$VAR`, `${VAR}` and a leading `~` against the given environment.
pub fn expand(value: &str, env: &Environ) -> String {
    shellexpand::full_with_context_no_errors(
        value,
        || dirs::home_dir().map(|p| p.to_string_lossy().into_owned()),
        |var| env.get(var).map(str::to_owned),
    )
    .into_owned()
}

/// Resolve a relative-looking path value against a root directory.
///
/// Absolute paths and bare tokens (no separator) pass through unchanged.
fn resolve_root(root: Option<&Path>, value: &str) -> String {
    let Some(root) = root else {
        return value.to_string();
    };
    let looks_relative =
        value.starts_with("./") || (value.contains('/') && !Path::new(value).is_absolute());
    if looks_relative {
        let value = value.strip_prefix("./").unwrap_or(value);
        root.join(value).to_string_lossy().into_owned()
    } else {
        value.to_string()
    }
}

/// Expansion and root resolution shared by all mutating operations.
fn prepare(value: &str, env: &Environ, flags: &OpFlags) -> String {
    let value = if flags.expand {
        expand(value, env).trim_matches('"').to_string()
    } else {
        value.to_string()
    };
    resolve_root(flags.root, &value)
}

fn split_list(value: &str, sep: char) -> Vec<String> {
    value.split(sep).map(str::to_string).collect()
}

fn join_list(parts: &[String], sep: char) -> String {
    parts.join(&sep.to_string())
}

fn already_present(parts: &[String], value: &str, env: &Environ, flags: &OpFlags) -> bool {
    if flags.expand {
        parts.iter().any(|part| expand(part, env) == value)
    } else {
        parts.iter().any(|part| part == value)
    }
}

/// Replace the variable wholesale. Returns the applied value and the
/// previous value, which is what undo needs to restore.
pub fn set_env(
    env: &mut Environ,
    name: &str,
    value: &str,
    flags: &OpFlags,
) -> (String, Option<String>) {
    let value = prepare(value, env, flags);
    let prev = env.get(name).map(str::to_string);
    env.set(name, value.clone());
    (value, prev)
}

/// Delete the variable. Returns the previous value, if any.
pub fn unset_env(env: &mut Environ, name: &str) -> Option<String> {
    env.remove(name)
}

/// Insert the value at the front of the list variable. Acts like `set` when
/// the variable is absent. Returns `None` when `no_dupes` suppressed the
/// insertion.
pub fn prepend_env(env: &mut Environ, name: &str, value: &str, flags: &OpFlags) -> Option<String> {
    let value = prepare(value, env, flags);
    match env.get(name).map(str::to_string) {
        None => {
            env.set(name, value.clone());
            Some(value)
        }
        Some(current) => {
            let mut parts = split_list(&current, flags.sep);
            if flags.no_dupes && already_present(&parts, &value, env, flags) {
                return None;
            }
            parts.insert(0, value.clone());
            env.set(name, join_list(&parts, flags.sep));
            Some(value)
        }
    }
}

/// Insert the value at the end of the list variable.
pub fn append_env(env: &mut Environ, name: &str, value: &str, flags: &OpFlags) -> Option<String> {
    let value = prepare(value, env, flags);
    match env.get(name).map(str::to_string) {
        None => {
            env.set(name, value.clone());
            Some(value)
        }
        Some(current) => {
            let mut parts = split_list(&current, flags.sep);
            if flags.no_dupes && already_present(&parts, &value, env, flags) {
                return None;
            }
            parts.push(value.clone());
            env.set(name, join_list(&parts, flags.sep));
            Some(value)
        }
    }
}

/// Remove one occurrence of the value from the list variable, searching from
/// the end when `from_end`. Deletes the variable when the list empties.
/// Absent variable or missing value is a no-op; returns the removed value
/// when something was actually removed.
pub fn pop_env(
    env: &mut Environ,
    name: &str,
    value: &str,
    from_end: bool,
    flags: &OpFlags,
) -> Option<String> {
    let value = prepare(value, env, flags);
    let current = env.get(name)?.to_string();
    let mut parts = split_list(&current, flags.sep);
    let index = if from_end {
        parts.iter().rposition(|part| part == &value)?
    } else {
        parts.iter().position(|part| part == &value)?
    };
    if parts.len() == 1 {
        env.remove(name);
    } else {
        parts.remove(index);
        env.set(name, join_list(&parts, flags.sep));
    }
    Some(value)
}
