// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Shell syntax adapters.
//!
//! The CLI emits variable assignments and aliases as shell commands on
//! stdout for the invoking shell wrapper to evaluate; these adapters are
//! pure string formatting per shell dialect.

use crate::env::EnvChanges;

#[cfg(test)]
#[path = "./shell_test.rs"]
mod shell_test;

/// A supported system shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Tcsh,
    WinCmd,
}

impl Shell {
    /// Resolve a shell from its name or path; `sh`/`csh` style synonyms are
    /// accepted (a login `-csh` included).
    pub fn from_name(name: &str) -> Option<Self> {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        match base {
            "bash" | "sh" => Some(Self::Bash),
            "tcsh" | "csh" | "-csh" => Some(Self::Tcsh),
            "DOS" | "cmd" => Some(Self::WinCmd),
            _ => None,
        }
    }

    /// Names accepted by [`Shell::from_name`], for CLI help text.
    pub const NAMES: &'static [&'static str] = &["bash", "tcsh", "DOS"];

    pub fn set_var(&self, key: &str, value: &str) -> String {
        match self {
            Shell::Bash => format!("export {key}=\"{value}\";"),
            Shell::Tcsh => format!("setenv {key} \"{value}\";"),
            Shell::WinCmd => format!("set {key}={}\n", value.replace('/', "\\")),
        }
    }

    pub fn unset_var(&self, key: &str) -> String {
        match self {
            Shell::Bash => format!("unset {key};"),
            Shell::Tcsh => format!("unsetenv {key};"),
            Shell::WinCmd => format!("set {key}=\n"),
        }
    }

    pub fn alias(&self, key: &str, value: &str) -> String {
        match self {
            // bash aliases don't reach subshells; define and export a
            // function instead
            Shell::Bash => format!("{key}() {{ {value}; }};\nexport -f {key};"),
            Shell::Tcsh => format!("alias {key} '{value}';"),
            Shell::WinCmd => format!("doskey {key}={value}\n"),
        }
    }

    /// Render an environment diff as evaluable shell commands.
    pub fn format_changes(&self, changes: &EnvChanges) -> String {
        let mut out = String::new();
        for (key, value) in &changes.changed {
            out.push_str(&self.set_var(key, value));
            out.push('\n');
        }
        for key in &changes.removed {
            out.push_str(&self.unset_var(key));
            out.push('\n');
        }
        out
    }
}

impl std::str::FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown shell {s:?} (expected one of {})",
                Self::NAMES.join(", ")
            )
        })
    }
}
