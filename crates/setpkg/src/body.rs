// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! The executable body of a package descriptor.
//!
//! Bodies are line-oriented directive programs rather than embedded scripts;
//! each directive declares one environment mutation (or a subordinate
//! package activation) and is interpreted by the session against the
//! package's scope.

#[cfg(test)]
#[path = "./body_test.rs"]
mod body_test;

/// One statement of a package body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Set { var: String, value: String },
    Unset { var: String },
    Prepend { var: String, value: String },
    Append { var: String, value: String },
    Pop { var: String, value: String },
    /// Activate a subordinate package (`pkg name[-version]`).
    SubPkg { request: String },
    Log { message: String },
}

impl Directive {
    /// `set VAR $VAR` assigns a variable to itself; executing it would churn
    /// the ledger for no effect, so it is detected and skipped.
    pub fn is_self_assign(&self) -> bool {
        match self {
            Directive::Set { var, value } => {
                let value = value.trim();
                value == format!("${var}") || value == format!("${{{var}}}")
            }
            _ => false,
        }
    }
}

/// A parsed body, ready for interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub directives: Vec<Directive>,
}

impl Program {
    /// Parse body text. Blank lines and `#` comments are ignored; anything
    /// else must be a known directive.
    pub fn parse(source: &str) -> Result<Program, String> {
        let mut directives = Vec::new();
        for (lineno, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lineno = lineno + 1;
            let (keyword, rest) = match line.split_once(char::is_whitespace) {
                Some((keyword, rest)) => (keyword, rest.trim()),
                None => (line, ""),
            };
            let directive = match keyword {
                "set" => {
                    let (var, value) = var_and_value(rest);
                    require_var(keyword, var, lineno)?;
                    Directive::Set {
                        var: var.to_string(),
                        value: value.to_string(),
                    }
                }
                "unset" => {
                    require_var(keyword, rest, lineno)?;
                    Directive::Unset {
                        var: rest.to_string(),
                    }
                }
                "prepend" | "append" | "pop" => {
                    let (var, value) = var_and_value(rest);
                    require_var(keyword, var, lineno)?;
                    if value.is_empty() {
                        return Err(format!("line {lineno}: '{keyword}' requires a value"));
                    }
                    let var = var.to_string();
                    let value = value.to_string();
                    match keyword {
                        "prepend" => Directive::Prepend { var, value },
                        "append" => Directive::Append { var, value },
                        _ => Directive::Pop { var, value },
                    }
                }
                "pkg" => {
                    if rest.is_empty() {
                        return Err(format!("line {lineno}: 'pkg' requires a package name"));
                    }
                    Directive::SubPkg {
                        request: rest.to_string(),
                    }
                }
                "log" => Directive::Log {
                    message: rest.to_string(),
                },
                other => {
                    return Err(format!("line {lineno}: unknown directive {other:?}"));
                }
            };
            directives.push(directive);
        }
        Ok(Program { directives })
    }
}

fn var_and_value(rest: &str) -> (&str, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((var, value)) => (var, value.trim()),
        None => (rest, ""),
    }
}

fn require_var(keyword: &str, var: &str, lineno: usize) -> Result<(), String> {
    if var.is_empty() {
        return Err(format!(
            "line {lineno}: '{keyword}' requires a variable name"
        ));
    }
    Ok(())
}
