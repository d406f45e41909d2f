// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkg set` command.

use clap::Args;
use miette::Result;

/// Activate packages in the current shell
#[derive(Debug, Args)]
pub struct CmdSet {
    /// Reload packages that are already active
    #[clap(long)]
    pub reload: bool,

    #[clap(flatten)]
    pub session: crate::SessionFlags,

    /// Shell dialect to emit commands for (bash, tcsh, DOS)
    pub shell: String,

    /// Packages to activate, as name or name-version
    #[clap(required = true)]
    pub packages: Vec<String>,
}

impl CmdSet {
    pub fn run(&mut self) -> Result<i32> {
        let shell = crate::parse_shell(&self.shell)?;
        let mut session = self.session.open()?;

        for request in &self.packages {
            if let Err(err) = session.add_package(request, self.reload) {
                // a bad package must not abort the shell eval; siblings
                // already processed still get their commands emitted
                if err.is_package_level() {
                    crate::report_package_error(err);
                } else {
                    return Err(err.into());
                }
            }
        }

        print!("{}", shell.format_changes(&session.changes()));
        Ok(0)
    }
}
