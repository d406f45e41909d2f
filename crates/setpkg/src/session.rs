// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! The session dependency engine.
//!
//! A [`Session`] orchestrates package activation against one injectable
//! environment: it decides per request whether to load, reload, switch, or
//! skip, recurses into requirements and subpackages, maintains the
//! dependency/dependent links in the ledger variables, and undoes recorded
//! mutations on removal.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::body::{Directive, Program};
use crate::env::{expand, EnvChanges, Environ, OpFlags};
use crate::error::{Error, Result};
use crate::package::{join_name, split_request, Descriptor, Package, PackageRequest};
use crate::scope::PackageScope;
use crate::store::{ActivationRecord, SessionStorage, StorageKind};
use crate::{
    DEPENDENCIES_PREFIX, DEPENDENTS_PREFIX, LIST_SEP, META_SEP, PATH_VAR, PKG_EXTENSION,
    VER_PREFIX,
};

#[cfg(test)]
#[path = "./session_test.rs"]
mod session_test;

/// Identity of a shared activation session.
///
/// The token is supplied explicitly by the caller; processes sharing a parent
/// shell derive it from the parent process id so that subshells share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token derived from the parent process id.
    pub fn from_parent_process() -> Self {
        #[cfg(unix)]
        {
            Self(std::os::unix::process::parent_id().to_string())
        }
        #[cfg(not(unix))]
        {
            Self("NULL".to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of transition applied to a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Adding,
    Removing,
    Reloading,
    Refreshing,
    Switching,
    Skipping,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Adding => "adding",
            Status::Removing => "removing",
            Status::Reloading => "reloading",
            Status::Refreshing => "refreshing",
            Status::Switching => "switching",
            Status::Skipping => "skipping",
        }
    }

    fn symbol(&self) -> char {
        match self {
            Status::Removing => '-',
            Status::Skipping => ' ',
            _ => '+',
        }
    }
}

/// One emitted status line, with its nesting depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: Status,
    pub package: String,
    pub depth: usize,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12}[{}]  {}{}",
            format!("{}:", self.status.label()),
            self.status.symbol(),
            "  ".repeat(self.depth),
            self.package
        )
    }
}

/// Static information about a package, for the `info` command.
#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    pub name: String,
    pub executable: String,
    pub versions: Vec<String>,
    pub aliases: Vec<(String, String)>,
    pub system_aliases: Vec<(String, String)>,
    pub active_version: Option<String>,
    pub requires: Vec<String>,
    pub subpackages: Vec<String>,
    pub dependents: Vec<String>,
    /// Values the active package contributed, per touched variable.
    pub variables: BTreeMap<String, Vec<String>>,
}

/// A persistent session managing the adding and removing of packages.
pub struct Session {
    id: SessionId,
    env: Environ,
    base: Environ,
    store: Box<dyn SessionStorage>,
    events: Vec<StatusEvent>,
    added: Vec<String>,
    removed: Vec<String>,
    quiet: bool,
}

impl Session {
    /// Open a session over the given environment snapshot.
    ///
    /// The snapshot is taken before the store claims its markers, so marker
    /// updates show up in [`Session::changes`] and reach the shell.
    pub fn new(id: SessionId, environ: Environ, kind: StorageKind) -> Result<Self> {
        let base = environ.clone();
        let mut env = environ;
        let store = crate::store::open(kind, id.as_str(), &mut env)?;
        Ok(Self {
            id,
            env,
            base,
            store,
            events: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
            quiet: false,
        })
    }

    /// Suppress status lines on stderr (events are still recorded).
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn environ(&self) -> &Environ {
        &self.env
    }

    pub fn events(&self) -> &[StatusEvent] {
        &self.events
    }

    /// Full names of packages activated by this session's calls.
    pub fn added(&self) -> &[String] {
        &self.added
    }

    /// Full names of packages deactivated by this session's calls.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Environment difference accumulated since the session opened.
    pub fn changes(&self) -> EnvChanges {
        self.env.diff(&self.base)
    }

    pub fn record(&self, name: &str) -> Option<&ActivationRecord> {
        self.store.get(name)
    }

    fn status(&mut self, status: Status, package: impl Into<String>, depth: usize) {
        let event = StatusEvent {
            status,
            package: package.into(),
            depth,
        };
        if !self.quiet {
            eprintln!("{event}");
        }
        tracing::info!("{}: {}", event.package, status.label());
        self.events.push(event);
    }

    // -----------------------------------------------------------------------
    // Discovery and activation state queries
    // -----------------------------------------------------------------------

    fn pkgpaths(&self) -> Result<Vec<String>> {
        let raw = self.env.get(PATH_VAR).ok_or(Error::SearchPathNotSet)?;
        Ok(raw
            .split(crate::env::LIST_SEPARATOR)
            .filter(|p| !p.is_empty())
            .map(|p| expand(p, &self.env))
            .collect())
    }

    /// Search `SETPKG_PATH` for the descriptor of an unversioned short name.
    pub fn find_package_file(&self, name: &str) -> Result<PathBuf> {
        for path in self.pkgpaths()? {
            let file = PathBuf::from(&path).join(format!("{name}.{PKG_EXTENSION}"));
            if file.is_file() {
                return Ok(dunce::canonicalize(&file).unwrap_or(file));
            }
        }
        Err(Error::PackageNotFound {
            name: name.to_string(),
        })
    }

    /// Every descriptor file on the search path, sorted, first hit winning
    /// for names that appear in more than one path entry.
    pub fn walk_package_files(&self) -> Result<Vec<PathBuf>> {
        let mut discovered = std::collections::HashSet::new();
        let mut files = Vec::new();
        for path in self.pkgpaths()? {
            let Ok(entries) = std::fs::read_dir(&path) else {
                continue;
            };
            let mut names: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.ends_with(&format!(".{PKG_EXTENSION}")))
                .collect();
            names.sort();
            for name in names {
                if discovered.insert(name.clone()) {
                    files.push(PathBuf::from(&path).join(name));
                }
            }
        }
        Ok(files)
    }

    /// Active version and content hash recorded for a package, if any.
    pub fn current_data(&self, name: &str) -> Option<(String, Option<String>)> {
        let raw = self.env.get(&format!("{VER_PREFIX}{name}"))?;
        match raw.split_once(META_SEP) {
            Some((version, hash)) => Some((version.to_string(), Some(hash.to_string()))),
            None => Some((raw.to_string(), None)),
        }
    }

    /// The currently set version for a package, or None if it is not set.
    pub fn current_version(&self, name: &str) -> Option<String> {
        self.current_data(name).map(|(version, _)| version)
    }

    /// Map of short name to active version for all active packages.
    pub fn current_versions(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter_map(|(name, value)| {
                let short = name.strip_prefix(VER_PREFIX)?;
                let version = value.split(META_SEP).next().unwrap_or(value);
                Some((short.to_string(), version.to_string()))
            })
            .collect()
    }

    /// Whether the package is set; a versioned request also checks that the
    /// given version is the active one.
    pub fn is_active(&self, request: &str) -> bool {
        let (name, version) = split_request(request);
        match (self.current_version(name), version) {
            (Some(active), Some(requested)) => active == requested,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn dependents_of(&self, name: &str) -> Vec<String> {
        self.env
            .get(&format!("{DEPENDENTS_PREFIX}{name}"))
            .map(|raw| {
                raw.split(LIST_SEP)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The version of `dependency` that `dependent` recorded when it loaded,
    /// or None when it did not pin one.
    fn required_version(&self, dependent: &str, dependency: &str) -> Option<String> {
        let raw = self.env.get(&format!("{DEPENDENCIES_PREFIX}{dependent}"))?;
        raw.split(LIST_SEP)
            .map(PackageRequest::parse)
            .find(|req| req.name == dependency)
            .and_then(|req| req.version)
    }

    /// Load and resolve the descriptor for a request.
    pub fn load_package(&self, request: &str) -> Result<Package> {
        let (name, version) = split_request(request);
        let file = self.find_package_file(name)?;
        Descriptor::load(&file)?.resolve(version, &self.env)
    }

    // -----------------------------------------------------------------------
    // Add / remove state machine
    // -----------------------------------------------------------------------

    /// Activate a package, loading it fresh, reloading, switching versions,
    /// or skipping as the current state requires.
    pub fn add_package(&mut self, request: &str, force: bool) -> Result<()> {
        self.add_inner(request, force, 0)
    }

    /// Deactivate a package, undoing its recorded mutations.
    pub fn remove_package(&mut self, request: &str, recurse: bool) -> Result<()> {
        self.remove_inner(request, recurse, 0, false)
    }

    fn add_inner(&mut self, request: &str, force: bool, depth: usize) -> Result<()> {
        let package = self.load_package(request)?;
        let name = package.name().to_string();
        let mut reloading = false;

        if force {
            if self.current_version(&name).is_some() {
                reloading = true;
                self.status(Status::Reloading, package.fullname(), depth);
                self.remove_inner(&name, false, depth + 1, true)?;
            }
        } else if let Some((curr_version, curr_hash)) = self.current_data(&name) {
            if curr_hash.as_deref() != Some(package.hash()) {
                // descriptor changed on disk since activation
                reloading = true;
                self.status(Status::Refreshing, package.fullname(), depth);
                self.remove_inner(&name, true, depth, true)?;
            } else if !package.explicit_version() || curr_version == package.version {
                if self.has_stale_dependencies(&package) {
                    reloading = true;
                    self.status(Status::Reloading, package.fullname(), depth);
                    self.remove_inner(&name, false, depth, true)?;
                } else {
                    self.status(Status::Skipping, package.origname(), depth);
                    return Ok(());
                }
            } else {
                reloading = true;
                self.status(
                    Status::Switching,
                    format!(
                        "{} --> {}",
                        join_name(&name, &curr_version),
                        package.version
                    ),
                    depth,
                );
                self.remove_inner(&name, false, depth, true)?;
            }
        }

        if !reloading {
            self.status(Status::Adding, package.fullname(), depth);
        }
        self.added.push(package.fullname());

        self.exec_package(&package, depth)?;

        if reloading {
            self.reload_dependents(&package, depth)?;
        }
        Ok(())
    }

    /// True when any declared requirement is inactive or active at a version
    /// other than the one this package pinned.
    fn has_stale_dependencies(&self, package: &Package) -> bool {
        package.requires().iter().any(|req| {
            match self.current_version(&req.name) {
                None => true,
                Some(active) => req
                    .version
                    .as_deref()
                    .is_some_and(|pinned| pinned != active.as_str()),
            }
        })
    }

    /// After a reload, dependents that did not pin a version follow along;
    /// dependents pinning a now-stale version only get a warning.
    fn reload_dependents(&mut self, package: &Package, depth: usize) -> Result<()> {
        for dependent in self.dependents_of(package.name()) {
            let Some(dependent_version) = self.current_version(&dependent) else {
                continue;
            };
            match self.required_version(&dependent, package.name()) {
                Some(pinned) if pinned != package.version => {
                    tracing::warn!(
                        "{} requires {}",
                        join_name(&dependent, &dependent_version),
                        join_name(package.name(), &pinned)
                    );
                }
                Some(_) => {}
                None => {
                    let fullname = join_name(&dependent, &dependent_version);
                    self.add_inner(&fullname, true, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn remove_inner(
        &mut self,
        request: &str,
        recurse: bool,
        depth: usize,
        reloading: bool,
    ) -> Result<()> {
        let (name, version) = split_request(request);
        if self.current_version(name).is_none() {
            return Err(Error::NotCurrentlySet {
                package: name.to_string(),
            });
        }
        let record = self
            .store
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CorruptSession(format!("no stored activation for {name}")))?;
        if let Some(version) = version {
            if record.version != version {
                return Err(Error::WrongActiveVersion {
                    package: name.to_string(),
                    requested: version.to_string(),
                    active: record.version.clone(),
                });
            }
        }

        if !reloading {
            self.status(Status::Removing, record.fullname(), depth);
        }

        PackageScope::undo_actions(&record.actions, &mut self.env);
        self.store.remove(&mut self.env, name)?;
        self.removed.push(record.fullname());

        if recurse {
            for sub in &record.subpackages {
                let (sub_name, _) = split_request(sub);
                if self.current_version(sub_name).is_some() {
                    self.remove_inner(sub, recurse, depth + 1, false)?;
                }
            }
        } else if !reloading {
            // dependents cannot outlive a removed dependency
            for dependent in self.dependents_of(name) {
                if self.current_version(&dependent).is_some() {
                    self.remove_inner(&dependent, false, depth + 1, false)?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Package execution
    // -----------------------------------------------------------------------

    fn exec_package(&mut self, package: &Package, depth: usize) -> Result<()> {
        let mut scope = PackageScope::new(package.root().map(PathBuf::from));
        let raw = OpFlags::raw(crate::env::LIST_SEPARATOR);
        let list = OpFlags::raw(LIST_SEP).with_no_dupes(true);

        // record the activation itself in the package's own ledger
        scope.var(&format!("{VER_PREFIX}{}", package.name())).set_with(
            &mut self.env,
            &format!("{}{}{}", package.version, META_SEP, package.hash()),
            &raw,
        );

        // requirements load first, then the links are written through this
        // package's scope so removal unwinds them
        let requires = package.requires();
        for req in &requires {
            self.add_inner(&req.to_string(), false, depth + 1)?;
        }
        for req in &requires {
            scope
                .var(&format!("{DEPENDENTS_PREFIX}{}", req.name))
                .append_with(&mut self.env, package.name(), &list);
            scope
                .var(&format!("{DEPENDENCIES_PREFIX}{}", package.name()))
                .append_with(&mut self.env, &req.to_string(), &list);
        }

        let program = Program::parse(package.body()).map_err(|detail| Error::Execution {
            package: package.name().to_string(),
            file: package.file().to_path_buf(),
            detail,
        })?;
        self.run_program(package, &program, &mut scope, depth)?;

        let record = ActivationRecord {
            name: package.name().to_string(),
            version: package.version.clone(),
            hash: package.hash().to_string(),
            root: package.root().map(PathBuf::from),
            actions: scope.into_actions(),
            requires: requires.iter().map(|r| r.to_string()).collect(),
            subpackages: package.subs().iter().map(|r| r.to_string()).collect(),
        };
        let subs = record.subpackages.clone();
        self.store.insert(&mut self.env, record)?;

        for sub in subs {
            self.add_inner(&sub, false, depth + 1)?;
        }
        Ok(())
    }

    /// Interpret the body with `NAME`, `VERSION` and `VERSION_PART<n>` bound
    /// for expansion alongside the live environment.
    fn run_program(
        &mut self,
        package: &Package,
        program: &Program,
        scope: &mut PackageScope,
        depth: usize,
    ) -> Result<()> {
        let mut bound = vec![
            ("NAME".to_string(), package.name().to_string()),
            ("VERSION".to_string(), package.version.clone()),
        ];
        if let Some(parts) = &package.version_parts {
            for (index, part) in parts.iter().enumerate() {
                bound.push((format!("VERSION_PART{}", index + 1), part.clone()));
            }
        }
        let saved: Vec<(String, Option<String>)> = bound
            .iter()
            .map(|(name, _)| (name.clone(), self.env.get(name).map(str::to_string)))
            .collect();
        for (name, value) in &bound {
            self.env.set(name.as_str(), value.clone());
        }

        let result = self.run_directives(package, program, scope, depth);

        for (name, prev) in saved {
            match prev {
                Some(prev) => self.env.set(name, prev),
                None => {
                    self.env.remove(&name);
                }
            }
        }
        result
    }

    fn run_directives(
        &mut self,
        package: &Package,
        program: &Program,
        scope: &mut PackageScope,
        depth: usize,
    ) -> Result<()> {
        for directive in &program.directives {
            if directive.is_self_assign() {
                tracing::debug!(package = package.name(), "skipping self-assignment");
                continue;
            }
            match directive {
                Directive::Set { var, value } => {
                    scope.var(var).set(&mut self.env, value);
                }
                Directive::Unset { var } => {
                    scope.var(var).unset(&mut self.env);
                }
                Directive::Prepend { var, value } => {
                    scope.var(var).prepend(&mut self.env, value);
                }
                Directive::Append { var, value } => {
                    scope.var(var).append(&mut self.env, value);
                }
                Directive::Pop { var, value } => {
                    scope.var(var).pop(&mut self.env, value, false);
                }
                Directive::SubPkg { request } => {
                    self.add_inner(request, false, depth + 1)?;
                }
                Directive::Log { message } => {
                    tracing::info!(package = package.name(), "{}", expand(message, &self.env));
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Listings and teardown
    // -----------------------------------------------------------------------

    /// Active packages in NAME-VERSION form, optionally filtered.
    pub fn list_active(&self, package: Option<&str>) -> Vec<String> {
        let versions = self.current_versions();
        match package {
            Some(name) => match versions.get(name) {
                Some(version) => vec![join_name(name, version)],
                None => {
                    tracing::warn!("package {name} is not currently active");
                    Vec::new()
                }
            },
            None => versions
                .iter()
                .map(|(name, version)| join_name(name, version))
                .collect(),
        }
    }

    /// Available packages in NAME-VERSION form; with `versions` disabled,
    /// just the short names.
    pub fn list_choices(
        &self,
        package: Option<&str>,
        versions: bool,
        aliases: bool,
    ) -> Result<Vec<String>> {
        let files = match package {
            Some(name) => vec![self.find_package_file(name)?],
            None => self.walk_package_files()?,
        };
        let mut choices = Vec::new();
        for file in files {
            if !versions {
                if let Some(stem) = file.file_stem() {
                    choices.push(stem.to_string_lossy().into_owned());
                }
                continue;
            }
            match Descriptor::load(&file) {
                Ok(descriptor) => {
                    choices.extend(
                        descriptor
                            .choices(aliases, true)
                            .into_iter()
                            .map(|v| join_name(&descriptor.name, &v)),
                    );
                }
                Err(err) => tracing::debug!("skipping {}: {err}", file.display()),
            }
        }
        Ok(choices)
    }

    /// Aggregate descriptor and activation information for one package.
    pub fn package_info(&self, name: &str) -> Result<PackageInfo> {
        let descriptor = Descriptor::load(&self.find_package_file(name)?)?;
        let mut info = PackageInfo {
            name: descriptor.name.clone(),
            executable: descriptor.executable().to_string(),
            versions: descriptor.versions.clone(),
            aliases: descriptor
                .aliases
                .iter()
                .map(|(a, v)| (a.clone(), v.clone()))
                .collect(),
            system_aliases: descriptor.system_aliases(),
            active_version: self.current_version(&descriptor.name),
            dependents: self.dependents_of(&descriptor.name),
            ..Default::default()
        };

        if let Some(record) = self.store.get(&descriptor.name) {
            info.requires = record.requires.clone();
            info.subpackages = record.subpackages.clone();
            info.variables = record
                .actions
                .iter()
                .map(|(var, actions)| {
                    let values = actions
                        .iter()
                        .filter_map(|action| match action {
                            crate::Action::Set { value, .. } => value.clone(),
                            crate::Action::Prepend { value, .. }
                            | crate::Action::Append { value, .. } => Some(value.clone()),
                            crate::Action::Pop { .. } => None,
                        })
                        .collect();
                    (var.clone(), values)
                })
                .collect();
        } else if let Ok(package) = descriptor.resolve(None, &self.env) {
            info.requires = package.requires().iter().map(|r| r.to_string()).collect();
            info.subpackages = package.subs().iter().map(|r| r.to_string()).collect();
        }
        Ok(info)
    }

    /// Tear the session's persistent state down once nothing is active.
    /// Returns true when markers were actually cleared.
    pub fn teardown_if_empty(&mut self) -> Result<bool> {
        if !self.current_versions().is_empty() {
            return Ok(false);
        }
        self.store.teardown(&mut self.env)?;
        Ok(true)
    }
}
