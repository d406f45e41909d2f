// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Extraction and parsing of the ini-style configuration header carried in
//! the leading comment block of a package descriptor file.

#[cfg(test)]
#[path = "./header_test.rs"]
mod header_test;

/// Parsed header document, with sections and entries in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigHeader {
    sections: Vec<(String, Vec<(String, String)>)>,
}

/// Split a descriptor source into its header text and executable body.
///
/// The header is every leading line that is blank or a `#` comment; the
/// first other line starts the body.
pub fn split_source(text: &str) -> (String, String) {
    let mut header = String::new();
    let mut body_start = 0;
    for (offset, line) in line_spans(text) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            header.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            header.push('\n');
        } else {
            body_start = offset;
            break;
        }
        body_start = offset + line.len();
    }
    (header, text[body_start..].to_string())
}

fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n')
        .scan(0usize, |offset, line| {
            let start = *offset;
            *offset += line.len();
            Some((start, line))
        })
}

impl ConfigHeader {
    /// Parse ini-style text: `[section]` headers followed by `key = value`
    /// entries (a bare `key` is an entry with an empty value).
    pub fn parse(text: &str) -> Self {
        let mut header = ConfigHeader::default();
        let mut current: Option<usize> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(header.section_index(name.trim()));
                continue;
            }
            let Some(section) = current else {
                tracing::warn!(line, "ignoring header entry outside any section");
                continue;
            };
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            };
            header.sections[section]
                .1
                .push((key.to_string(), value.to_string()));
        }
        header
    }

    fn section_index(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.sections.push((name.to_string(), Vec::new()));
                self.sections.len() - 1
            }
        }
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|(n, _)| n == name)
    }

    /// Entries of a section, in declaration order.
    pub fn section(&self, name: &str) -> &[(String, String)] {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    /// First value for a key within a section.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        self.get(section, key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }
}
