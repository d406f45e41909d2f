// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkg list` command.

use clap::Args;
use miette::Result;

/// List available or active packages
#[derive(Debug, Args)]
pub struct CmdList {
    /// List only currently active packages
    #[clap(long)]
    pub active: bool,

    /// List bare package names without versions
    #[clap(short = 'b', long)]
    pub base: bool,

    #[clap(flatten)]
    pub session: crate::SessionFlags,

    /// Restrict the listing to one package
    pub package: Option<String>,
}

impl CmdList {
    pub fn run(&mut self) -> Result<i32> {
        let session = self.session.open()?;

        // listings are diagnostic text; stdout stays reserved for shell
        // commands
        let lines = if self.active {
            session.list_active(self.package.as_deref())
        } else {
            session.list_choices(self.package.as_deref(), !self.base, false)?
        };
        for line in lines {
            eprintln!("{line}");
        }
        Ok(0)
    }
}
