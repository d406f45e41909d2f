// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! setpkg - Per-Process Environment Package Manager
//!
//! This crate provides the core library for managing named, versioned
//! application environment profiles ("packages") defined by `.pkg` descriptor
//! files found on `SETPKG_PATH`.
//!
//! # Overview
//!
//! Activating a package executes its descriptor body against the session
//! environment while recording every variable mutation, so the activation can
//! be precisely undone later. Activation state survives across separate
//! process invocations sharing a parent shell, persisted either in a session
//! file or encoded directly into environment variables.
//!
//! # Example
//!
//! ```text
//! # nuke.pkg
//! # [main]
//! # executable-path = Nuke
//! # version-regex = (\d+)\.(\d+)v(\d+)
//! # default-version = 6.0
//! #
//! # [aliases]
//! # 6.0 = 6.0v6
//! #
//! # [versions]
//! # 6.0v6 =
//! # 6.1v2 =
//! #
//! # [requires]
//! # 6.* = python-2.5
//! #
//! # [subs]
//! # * = djv
//!
//! set NUKE_VER $VERSION
//! set NUKE_APP /usr/local/Nuke$VERSION
//! prepend PATH $NUKE_APP
//! prepend NUKE_PATH ./gizmos
//! ```
//!
//! Body directives run with the bound names `NAME`, `VERSION` and
//! `VERSION_PART1..N` (the `version-regex` capture groups) available for
//! expansion alongside the session environment.

pub mod action;
pub mod body;
pub mod env;
pub mod error;
pub mod header;
pub mod package;
pub mod scope;
pub mod session;
pub mod shell;
pub mod store;
pub mod version;

pub use action::Action;
pub use body::{Directive, Program};
pub use env::{Environ, EnvChanges, OpFlags};
pub use error::{Error, Result};
pub use header::ConfigHeader;
pub use package::{join_name, split_request, Descriptor, Package, PackageRequest};
pub use scope::{PackageScope, VarHandle};
pub use session::{PackageInfo, Session, SessionId, Status, StatusEvent};
pub use shell::Shell;
pub use store::{ActivationRecord, InitKind, SessionStorage, StorageKind};

/// File extension for package descriptor files.
pub const PKG_EXTENSION: &str = "pkg";

/// Search path variable for package descriptor files.
pub const PATH_VAR: &str = "SETPKG_PATH";

/// Prefix of the per-package activation ledger variable
/// (`SETPKG_VERSION_<name>` = `<version>,<hash>`).
pub const VER_PREFIX: &str = "SETPKG_VERSION_";

/// Prefix of the per-package dependency list variable.
pub const DEPENDENCIES_PREFIX: &str = "SETPKG_DEPENDENCIES_";

/// Prefix of the per-package dependent list variable.
pub const DEPENDENTS_PREFIX: &str = "SETPKG_DEPENDENTS_";

/// Separator between version and content hash in the activation variable.
pub const META_SEP: char = ',';

/// Separator between a package name and its version in a request.
pub const PKG_SEP: char = '-';

/// Separator used in the dependency/dependent list variables.
pub const LIST_SEP: char = ',';

/// Session marker variable holding the owning session token.
pub const SESSION_VAR: &str = "SETPKG_SESSION";

/// Marker variable naming the on-disk session store file.
pub const STORE_FILE_VAR: &str = "SETPKG_STORE";

/// Prefix of the numbered chunk variables used by the env-encoded store.
pub const SESSION_DATA_PREFIX: &str = "SETPKG_SESSION_DATA_";
