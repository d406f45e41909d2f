// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkg info` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

/// Display information about one package
#[derive(Debug, Args)]
pub struct CmdInfo {
    /// Show only the variables the active package set
    #[clap(long)]
    pub vars: bool,

    /// Show only the executable name
    #[clap(long)]
    pub exe: bool,

    /// Show only the active version
    #[clap(long = "version")]
    pub active_version: bool,

    #[clap(flatten)]
    pub session: crate::SessionFlags,

    /// Package to describe
    pub package: String,
}

impl CmdInfo {
    pub fn run(&mut self) -> Result<i32> {
        let session = self.session.open()?;
        let info = session.package_info(&self.package)?;

        if self.exe {
            eprintln!("{}", info.executable);
            return Ok(0);
        }
        if self.active_version {
            match &info.active_version {
                Some(version) => eprintln!("{version}"),
                None => eprintln!("package {} is not currently active", info.name),
            }
            return Ok(0);
        }
        if self.vars {
            self.print_variables(&info);
            return Ok(0);
        }

        let row = |label: &str, value: &str| {
            eprintln!("{:<20}{}", format!("{label}:").bold(), value);
        };
        row("name", &info.name);
        row("executable", &info.executable);
        row("versions", &info.versions.join(", "));
        row("subpackages", &info.subpackages.join(", "));
        row("dependencies", &info.requires.join(", "));
        row("dependents", &info.dependents.join(", "));
        row(
            "active version",
            info.active_version.as_deref().unwrap_or(""),
        );

        if !info.system_aliases.is_empty() {
            eprintln!(
                "{:<20}{:<30}{}",
                "run commands:".bold(),
                "[command]",
                "[package]"
            );
            for (alias, target) in &info.system_aliases {
                eprintln!("{:<20}{alias:<30}{target}", "");
            }
        }
        if !info.aliases.is_empty() {
            eprintln!(
                "{:<20}{:<30}{}",
                "package aliases:".bold(),
                "[alias]",
                "[version]"
            );
            for (alias, version) in &info.aliases {
                eprintln!("{:<20}{alias:<30}{version}", "");
            }
        }
        if !info.variables.is_empty() {
            eprintln!(
                "{:<20}{:<30}{}",
                "variables:".bold(),
                "[variable]",
                "[values]"
            );
            self.print_variables(&info);
        }
        Ok(0)
    }

    fn print_variables(&self, info: &setpkg::PackageInfo) {
        for (variable, values) in &info.variables {
            let mut first = true;
            for value in values {
                if first {
                    eprintln!("{:<20}{variable:<30}{value}", "");
                    first = false;
                } else {
                    eprintln!("{:<20}{:<30}{value}", "", "");
                }
            }
            if values.is_empty() {
                eprintln!("{:<20}{variable:<30}", "");
            }
        }
    }
}
