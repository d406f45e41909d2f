// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Per-package mutation tracking.
//!
//! A [`PackageScope`] is the facade a package body mutates the environment
//! through. Every change is recorded as an [`Action`] against the variable it
//! touched, so the whole activation can later be undone in reverse order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::action::Action;
use crate::env::{append_env, pop_env, prepend_env, set_env, unset_env, Environ, OpFlags};

#[cfg(test)]
#[path = "./scope_test.rs"]
mod scope_test;

/// Ordered action log for one package activation.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    root: Option<PathBuf>,
    vars: BTreeMap<String, Vec<Action>>,
}

impl PackageScope {
    /// Create a scope; relative path values are resolved against `root`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            vars: BTreeMap::new(),
        }
    }

    /// Handle bound to one variable of this scope.
    pub fn var(&mut self, name: &str) -> VarHandle<'_> {
        VarHandle {
            name: name.to_string(),
            root: self.root.clone(),
            scope: self,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// The recorded actions, keyed by variable name.
    pub fn actions(&self) -> &BTreeMap<String, Vec<Action>> {
        &self.vars
    }

    pub fn into_actions(self) -> BTreeMap<String, Vec<Action>> {
        self.vars
    }

    /// Undo a recorded action log against the environment, each variable in
    /// reverse chronological order.
    pub fn undo_actions(actions: &BTreeMap<String, Vec<Action>>, env: &mut Environ) {
        for (name, actions) in actions {
            for action in actions.iter().rev() {
                action.undo(env, name);
            }
        }
    }
}

/// Mutating access to a single variable, recording into the owning scope.
#[derive(Debug)]
pub struct VarHandle<'a> {
    scope: &'a mut PackageScope,
    name: String,
    root: Option<PathBuf>,
}

impl VarHandle<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn record(&mut self, action: Action) {
        self.scope
            .vars
            .entry(self.name.clone())
            .or_default()
            .push(action);
    }

    /// Current value in the given environment.
    pub fn value<'e>(&self, env: &'e Environ) -> Option<&'e str> {
        env.get(&self.name)
    }

    pub fn is_set(&self, env: &Environ) -> bool {
        env.contains(&self.name)
    }

    pub fn set(&mut self, env: &mut Environ, value: &str) {
        let root = self.root.clone();
        let flags = OpFlags::default().with_root(root.as_deref());
        self.set_with(env, value, &flags);
    }

    pub fn set_with(&mut self, env: &mut Environ, value: &str, flags: &OpFlags) {
        let (applied, prev) = set_env(env, &self.name, value, flags);
        self.record(Action::Set {
            value: Some(applied),
            prev,
        });
    }

    pub fn unset(&mut self, env: &mut Environ) {
        let prev = unset_env(env, &self.name);
        self.record(Action::Set { value: None, prev });
    }

    pub fn prepend(&mut self, env: &mut Environ, value: &str) {
        let root = self.root.clone();
        let flags = OpFlags::default().with_root(root.as_deref());
        self.prepend_with(env, value, &flags);
    }

    pub fn prepend_with(&mut self, env: &mut Environ, value: &str, flags: &OpFlags) {
        if let Some(applied) = prepend_env(env, &self.name, value, flags) {
            self.record(Action::Prepend {
                value: applied,
                sep: flags.sep,
            });
        }
    }

    pub fn append(&mut self, env: &mut Environ, value: &str) {
        let root = self.root.clone();
        let flags = OpFlags::default().with_root(root.as_deref());
        self.append_with(env, value, &flags);
    }

    pub fn append_with(&mut self, env: &mut Environ, value: &str, flags: &OpFlags) {
        if let Some(applied) = append_env(env, &self.name, value, flags) {
            self.record(Action::Append {
                value: applied,
                sep: flags.sep,
            });
        }
    }

    pub fn pop(&mut self, env: &mut Environ, value: &str, from_end: bool) {
        let root = self.root.clone();
        let flags = OpFlags::default().with_root(root.as_deref());
        self.pop_with(env, value, from_end, &flags);
    }

    pub fn pop_with(&mut self, env: &mut Environ, value: &str, from_end: bool, flags: &OpFlags) {
        let removed = pop_env(env, &self.name, value, from_end, flags);
        let value = removed.clone().unwrap_or_else(|| value.to_string());
        self.record(Action::Pop {
            value,
            from_end,
            removed: removed.is_some(),
            sep: flags.sep,
        });
    }
}
