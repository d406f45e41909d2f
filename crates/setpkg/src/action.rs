// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Reversible environment mutations recorded by a package scope.

use serde::{Deserialize, Serialize};

use crate::env::{append_env, pop_env, prepend_env, set_env, unset_env, Environ, OpFlags};

/// One recorded change to a single environment variable.
///
/// Each variant captures enough of the prior state to invert itself. Undo
/// works on the current head/tail of the list value rather than an absolute
/// position, so exact restoration of a variable shared between packages is
/// only guaranteed when packages are removed in reverse order of addition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Action {
    /// Wholesale replacement; `value` of `None` means the variable was
    /// deleted. `prev` is what undo restores.
    Set {
        value: Option<String>,
        prev: Option<String>,
    },
    Prepend {
        value: String,
        sep: char,
    },
    Append {
        value: String,
        sep: char,
    },
    /// An explicit removal; `removed` is false when the pop found nothing
    /// and there is nothing to put back.
    Pop {
        value: String,
        from_end: bool,
        removed: bool,
        sep: char,
    },
}

impl Action {
    /// Invert this action against the given environment.
    pub fn undo(&self, env: &mut Environ, name: &str) {
        match self {
            Action::Set { prev, .. } => {
                tracing::debug!(var = name, "undoing set");
                match prev {
                    Some(prev) => {
                        set_env(env, name, prev, &OpFlags::raw(crate::env::LIST_SEPARATOR));
                    }
                    None => {
                        unset_env(env, name);
                    }
                }
            }
            Action::Prepend { value, sep } => {
                tracing::debug!(var = name, value = value.as_str(), "undoing prepend");
                pop_env(env, name, value, false, &OpFlags::raw(*sep));
            }
            Action::Append { value, sep } => {
                tracing::debug!(var = name, value = value.as_str(), "undoing append");
                pop_env(env, name, value, true, &OpFlags::raw(*sep));
            }
            Action::Pop {
                value,
                from_end,
                removed,
                sep,
            } => {
                if !*removed {
                    return;
                }
                tracing::debug!(var = name, value = value.as_str(), "undoing pop");
                if *from_end {
                    append_env(env, name, value, &OpFlags::raw(*sep));
                } else {
                    prepend_env(env, name, value, &OpFlags::raw(*sep));
                }
            }
        }
    }
}
