// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkg unset` command.

use clap::Args;
use miette::Result;

use setpkg::split_request;

/// Deactivate packages, undoing their environment changes
#[derive(Debug, Args)]
pub struct CmdUnset {
    /// Remove every active package and tear the session down
    #[clap(short = 'a', long)]
    pub all: bool,

    /// Also remove each package's subpackages
    #[clap(short = 'r', long)]
    pub recurse: bool,

    #[clap(flatten)]
    pub session: crate::SessionFlags,

    /// Shell dialect to emit commands for (bash, tcsh, DOS)
    pub shell: String,

    /// Packages to deactivate
    pub packages: Vec<String>,
}

impl CmdUnset {
    pub fn run(&mut self) -> Result<i32> {
        let shell = crate::parse_shell(&self.shell)?;
        let mut session = self.session.open()?;

        let targets = if self.all {
            session.current_versions().into_keys().collect()
        } else if self.packages.is_empty() {
            return Err(miette::miette!(
                "no packages given (use --all to remove everything)"
            ));
        } else {
            self.packages.clone()
        };

        for request in &targets {
            // earlier removals may already have cascaded into this one
            let (name, _) = split_request(request);
            if self.all && session.current_version(name).is_none() {
                continue;
            }
            if let Err(err) = session.remove_package(request, self.recurse) {
                if err.is_package_level() {
                    crate::report_package_error(err);
                } else {
                    return Err(err.into());
                }
            }
        }

        if self.all {
            session.teardown_if_empty()?;
        }

        print!("{}", shell.format_changes(&session.changes()));
        Ok(0)
    }
}
