// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for setpkg operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with setpkg Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during setpkg operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// No descriptor file found on the search path
    #[error("{name}: unknown package")]
    #[diagnostic(
        code(setpkg::package_not_found),
        help("Check that a {name}.pkg file exists on SETPKG_PATH")
    )]
    PackageNotFound { name: String },

    /// SETPKG_PATH is not set in the session environment
    #[error("SETPKG_PATH environment variable not set")]
    #[diagnostic(code(setpkg::search_path_not_set))]
    SearchPathNotSet,

    /// Malformed or incomplete package header
    #[error("{package}: {detail}")]
    #[diagnostic(
        code(setpkg::configuration),
        help("Fix the ini-style header at the top of the package file")
    )]
    Configuration { package: String, detail: String },

    /// Requested version is not declared, aliased, or regex-accepted
    #[error("{package}: invalid version {version} (valid choices are {})", .choices.join(", "))]
    #[diagnostic(code(setpkg::invalid_version))]
    InvalidVersion {
        package: String,
        version: String,
        choices: Vec<String>,
    },

    /// Remove targeting a package that is not active
    #[error("{package}: package is not currently set")]
    #[diagnostic(code(setpkg::not_currently_set))]
    NotCurrentlySet { package: String },

    /// Remove targeting a version other than the active one
    #[error(
        "{package}: version {requested} cannot be removed because it is not \
         currently set (active version is {active})"
    )]
    #[diagnostic(code(setpkg::wrong_active_version))]
    WrongActiveVersion {
        package: String,
        requested: String,
        active: String,
    },

    /// The package body failed to parse or execute
    #[error("error during execution of {file:?} for package {package}: {detail}")]
    #[diagnostic(
        code(setpkg::execution),
        help("Mutations applied before the failure are not rolled back")
    )]
    Execution {
        package: String,
        file: PathBuf,
        detail: String,
    },

    /// Persisted session state could not be decoded
    #[error("corrupted session data: {0}")]
    #[diagnostic(
        code(setpkg::corrupt_session),
        help("Remove the SETPKG_SESSION* variables to start a fresh session")
    )]
    CorruptSession(String),

    /// Failed to read a file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(setpkg::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Session store (de)serialization failure
    #[error("session store error: {0}")]
    #[diagnostic(code(setpkg::store))]
    Store(#[from] serde_json::Error),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(setpkg::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors scoped to a single package request. The CLI reports these on
    /// stderr and keeps processing sibling requests; anything else aborts
    /// the whole invocation.
    pub fn is_package_level(&self) -> bool {
        matches!(
            self,
            Error::PackageNotFound { .. }
                | Error::Configuration { .. }
                | Error::InvalidVersion { .. }
                | Error::NotCurrentlySet { .. }
                | Error::WrongActiveVersion { .. }
                | Error::Execution { .. }
        )
    }
}
