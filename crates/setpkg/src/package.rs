// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Package descriptor files and version resolution.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::env::Environ;
use crate::error::{Error, Result};
use crate::header::{split_source, ConfigHeader};
use crate::{version, PKG_SEP};

#[cfg(test)]
#[path = "./package_test.rs"]
mod package_test;

/// Split a `name[-version]` request into its short name and optional version.
pub fn split_request(request: &str) -> (&str, Option<&str>) {
    match request.split_once(PKG_SEP) {
        Some((name, version)) => (name, Some(version)),
        None => (request, None),
    }
}

/// Join a short name and version back into a full request.
pub fn join_name(name: &str, version: &str) -> String {
    format!("{name}{PKG_SEP}{version}")
}

/// One dependency or subpackage entry, optionally pinning a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub name: String,
    pub version: Option<String>,
}

impl PackageRequest {
    pub fn parse(spec: &str) -> Self {
        let (name, version) = split_request(spec);
        Self {
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }
}

impl std::fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}{}{}", self.name, PKG_SEP, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A parsed descriptor file, independent of any particular version request.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Path of the descriptor file.
    pub file: PathBuf,
    /// Short name, taken from the file stem.
    pub name: String,
    /// Content hash of the whole descriptor file.
    pub hash: String,
    /// Declared valid versions, in component order.
    pub versions: Vec<String>,
    /// Alias map, fully expanded onto concrete versions.
    pub aliases: BTreeMap<String, String>,
    version_regex: Option<Regex>,
    versions_from_regex: bool,
    header: ConfigHeader,
    body: String,
}

impl Descriptor {
    /// Read and parse a descriptor file.
    pub fn load(file: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(file).map_err(|error| Error::ReadFailed {
            path: file.to_path_buf(),
            error,
        })?;
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hash = format!("{:x}", Sha256::digest(content.as_bytes()));

        let (header_text, body) = split_source(&content);
        let header = ConfigHeader::parse(&header_text);

        let versions = read_versions(&name, &header)?;
        let aliases = expand_aliases(&header, &versions);
        let version_regex = read_version_regex(&name, &header)?;
        let versions_from_regex = header
            .get_bool("main", "versions-from-regex")
            .unwrap_or(false);

        Ok(Self {
            file: file.to_path_buf(),
            name,
            hash,
            versions,
            aliases,
            version_regex,
            versions_from_regex,
            header,
            body,
        })
    }

    /// Executable name, defaulting to the short name.
    pub fn executable(&self) -> &str {
        self.header
            .get("main", "executable-path")
            .unwrap_or(&self.name)
    }

    /// Valid version choices, for listings and error messages.
    pub fn choices(&self, aliases: bool, regex: bool) -> Vec<String> {
        let mut choices = self.versions.clone();
        if aliases {
            choices.extend(self.aliases.keys().cloned());
        }
        if regex && self.versions_from_regex {
            if let Some(re) = &self.version_regex {
                choices.push(format!("(regex: {})", re.as_str()));
            }
        }
        choices
    }

    /// `(alias, name-version)` pairs from the `[system-aliases]` section.
    /// An empty value means the suffix itself names the version.
    pub fn system_aliases(&self) -> Vec<(String, String)> {
        let mut result = Vec::new();
        for (suffix, target) in self.header.section("system-aliases") {
            let target = if target.is_empty() { suffix } else { target };
            let version = self
                .aliases
                .get(target)
                .map(String::as_str)
                .unwrap_or(target);
            result.push((
                format!("{}{}", self.name, suffix),
                join_name(&self.name, version),
            ));
        }
        result
    }

    /// Resolve a version request against this descriptor.
    ///
    /// Resolution order: explicit `requested` version, then the
    /// `SETPKG_<NAME>_DEFAULT_VERSION` override from the environment, then
    /// the header `default-version`, then the sole declared version if there
    /// is exactly one. The result must land in `versions`, possibly through
    /// one level of alias expansion or `versions-from-regex` acceptance.
    pub fn resolve(self, requested: Option<&str>, env: &Environ) -> Result<Package> {
        let explicit = requested.is_some();
        let mut version = match requested {
            Some(version) => version.to_string(),
            None => self.default_version(env)?,
        };
        if !self.versions.iter().any(|v| *v == version) {
            if let Some(target) = self.aliases.get(&version) {
                version = target.clone();
            }
        }
        if !self.versions.iter().any(|v| *v == version) && !self.accepted_by_regex(&version) {
            let shown = if explicit {
                version
            } else {
                format!("{version} (default)")
            };
            return Err(Error::InvalidVersion {
                package: self.name.clone(),
                version: shown,
                choices: self.choices(true, true),
            });
        }

        let version_parts = self.split_version_parts(&version);
        Ok(Package {
            version,
            version_parts,
            explicit,
            descriptor: self,
        })
    }

    fn default_version(&self, env: &Environ) -> Result<String> {
        let override_var = format!("SETPKG_{}_DEFAULT_VERSION", self.name.to_uppercase());
        if let Some(version) = env.get(&override_var) {
            return Ok(version.to_string());
        }
        if let Some(version) = self.header.get("main", "default-version") {
            return Ok(version.to_string());
        }
        if self.versions.len() == 1 {
            return Ok(self.versions[0].clone());
        }
        Err(Error::Configuration {
            package: self.name.clone(),
            detail: "no 'default-version' specified in package header ([main] section)"
                .to_string(),
        })
    }

    fn accepted_by_regex(&self, version: &str) -> bool {
        match &self.version_regex {
            Some(regex) if self.versions_from_regex => regex.is_match(version),
            _ => false,
        }
    }

    fn split_version_parts(&self, version: &str) -> Option<Vec<String>> {
        let regex = self.version_regex.as_ref()?;
        match regex.captures(version) {
            Some(captures) => Some(
                captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect(),
            ),
            None => {
                tracing::warn!(
                    package = self.name.as_str(),
                    version,
                    "could not split version using version-regex"
                );
                None
            }
        }
    }
}

/// A descriptor with its version resolved for one activation.
///
/// Packages are loaded fresh for every add/remove call and never cached
/// across calls; the session store keeps only the persisted activation state.
#[derive(Debug, Clone)]
pub struct Package {
    pub descriptor: Descriptor,
    /// Resolved version for this activation.
    pub version: String,
    /// Capture groups of `version-regex` against the resolved version.
    pub version_parts: Option<Vec<String>>,
    explicit: bool,
}

impl Package {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn hash(&self) -> &str {
        &self.descriptor.hash
    }

    pub fn file(&self) -> &Path {
        &self.descriptor.file
    }

    pub fn body(&self) -> &str {
        &self.descriptor.body
    }

    /// True when a particular version was requested rather than defaulted.
    pub fn explicit_version(&self) -> bool {
        self.explicit
    }

    pub fn fullname(&self) -> String {
        join_name(self.name(), &self.version)
    }

    /// The request string this package was loaded for.
    pub fn origname(&self) -> String {
        if self.explicit {
            self.fullname()
        } else {
            self.name().to_string()
        }
    }

    /// Directory the descriptor lives in; relative path values in the body
    /// resolve against it.
    pub fn root(&self) -> Option<&Path> {
        self.descriptor.file.parent()
    }

    /// Packages that must be active before this one, for the resolved
    /// version. Every matching glob contributes, in declaration order.
    pub fn requires(&self) -> Vec<PackageRequest> {
        self.read_packagelist("requires")
    }

    /// Packages activated after this one's body runs.
    pub fn subs(&self) -> Vec<PackageRequest> {
        self.read_packagelist("subs")
    }

    fn read_packagelist(&self, section: &str) -> Vec<PackageRequest> {
        let mut requests = Vec::new();
        for (pattern, list) in self.descriptor.header.section(section) {
            let matcher = match glob::Pattern::new(pattern) {
                Ok(matcher) => matcher,
                Err(err) => {
                    tracing::warn!(
                        package = self.name(),
                        pattern = pattern.as_str(),
                        "invalid version glob in [{section}] section: {err}"
                    );
                    continue;
                }
            };
            if matcher.matches(&self.version) {
                requests.extend(
                    list.split(',')
                        .map(str::trim)
                        .filter(|spec| !spec.is_empty())
                        .map(PackageRequest::parse),
                );
            }
        }
        requests
    }
}

fn read_versions(name: &str, header: &ConfigHeader) -> Result<Vec<String>> {
    if !header.has_section("versions") {
        return Err(Error::Configuration {
            package: name.to_string(),
            detail: "no [versions] section in package header".to_string(),
        });
    }
    let mut valid: Vec<String> = Vec::new();
    for (token, _) in header.section("versions") {
        if version::is_valid_token(token) {
            valid.push(token.clone());
        } else {
            tracing::warn!(
                package = name,
                version = token.as_str(),
                "version in package file is invalidly formatted"
            );
        }
    }
    if valid.is_empty() {
        return Err(Error::Configuration {
            package: name.to_string(),
            detail: "No valid versions were found".to_string(),
        });
    }
    valid.sort_by(|a, b| version::compare(a, b));
    Ok(valid)
}

/// Recursively expand aliases onto concrete versions; chains that cycle or
/// dangle are dropped rather than surfaced.
fn expand_aliases(header: &ConfigHeader, versions: &[String]) -> BTreeMap<String, String> {
    let raw: BTreeMap<String, String> = header
        .section("aliases")
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut expanded = BTreeMap::new();
    for alias in raw.keys() {
        let mut seen = HashSet::new();
        let mut target = raw.get(alias);
        let resolved = loop {
            match target {
                None => break None,
                Some(value) if versions.iter().any(|v| v == value) => break Some(value.clone()),
                Some(value) => {
                    if !seen.insert(value.clone()) {
                        break None;
                    }
                    target = raw.get(value);
                }
            }
        };
        match resolved {
            Some(version) => {
                expanded.insert(alias.clone(), version);
            }
            None => {
                tracing::debug!(alias = alias.as_str(), "dropping unresolvable version alias");
            }
        }
    }
    expanded
}

fn read_version_regex(name: &str, header: &ConfigHeader) -> Result<Option<Regex>> {
    let Some(pattern) = header.get("main", "version-regex") else {
        return Ok(None);
    };
    Regex::new(&format!("^(?:{pattern})$"))
        .map(Some)
        .map_err(|err| Error::Configuration {
            package: name.to_string(),
            detail: format!("invalid version-regex: {err}"),
        })
}
