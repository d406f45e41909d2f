// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Version token validation and component-wise ordering.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(test)]
#[path = "./version_test.rs"]
mod version_test;

/// Allowed characters for a version token: letters, numbers, period, dash,
/// underscore.
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9.\-_]+$").expect("static regex"));

/// Whether the token is a well-formed version string.
pub fn is_valid_token(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Text(String),
}

/// Split a version into comparable components: runs of digits compare
/// numerically, runs of letters lexically, `.`/`-`/`_` only separate.
fn components(version: &str) -> Vec<Component> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut numeric = false;

    let mut flush = |current: &mut String, numeric: bool, parts: &mut Vec<Component>| {
        if current.is_empty() {
            return;
        }
        let component = if numeric {
            current
                .parse::<u64>()
                .map(Component::Number)
                .unwrap_or_else(|_| Component::Text(std::mem::take(current)))
        } else {
            Component::Text(current.clone())
        };
        parts.push(component);
        current.clear();
    };

    for ch in version.chars() {
        if matches!(ch, '.' | '-' | '_') {
            flush(&mut current, numeric, &mut parts);
            continue;
        }
        if ch.is_ascii_digit() != numeric {
            flush(&mut current, numeric, &mut parts);
            numeric = ch.is_ascii_digit();
        }
        current.push(ch);
    }
    flush(&mut current, numeric, &mut parts);
    parts
}

/// Component-wise tuple comparison, not pure lexical ordering: `6.0v10`
/// sorts after `6.0v9`.
pub fn compare(a: &str, b: &str) -> Ordering {
    components(a).cmp(&components(b))
}
