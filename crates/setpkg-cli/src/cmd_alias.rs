// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkg alias` command.

use clap::Args;
use miette::Result;

use setpkg::Descriptor;

/// Emit shell aliases declared by package files
#[derive(Debug, Args)]
pub struct CmdAlias {
    #[clap(flatten)]
    pub session: crate::SessionFlags,

    /// Shell dialect to emit commands for (bash, tcsh, DOS)
    pub shell: String,
}

impl CmdAlias {
    pub fn run(&mut self) -> Result<i32> {
        let shell = crate::parse_shell(&self.shell)?;
        let session = self.session.open()?;

        for file in session.walk_package_files()? {
            match Descriptor::load(&file) {
                Ok(descriptor) => {
                    for (alias, target) in descriptor.system_aliases() {
                        // the setpkg shell function wraps `pkg set` and evals
                        // its output
                        println!("{}", shell.alias(&alias, &format!("setpkg {target}")));
                    }
                }
                Err(err) => {
                    tracing::debug!("skipping {}: {err}", file.display());
                }
            }
        }
        Ok(0)
    }
}
