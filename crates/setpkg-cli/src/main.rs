// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

//! pkg - Per-Process Environment Package Manager CLI
//!
//! Every subcommand writes evaluable shell commands to stdout and
//! diagnostics to stderr; a thin shell wrapper function is expected to eval
//! the stdout of each invocation.

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_alias;
mod cmd_info;
mod cmd_list;
mod cmd_set;
mod cmd_unset;

use cmd_alias::CmdAlias;
use cmd_info::CmdInfo;
use cmd_list::CmdList;
use cmd_set::CmdSet;
use cmd_unset::CmdUnset;

#[derive(Parser)]
#[clap(
    name = "pkg",
    about = "Per-Process Environment Package Manager",
    version,
    long_about = "Manage per-shell application environments through versioned package descriptor files found on SETPKG_PATH"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long)]
    quiet: bool,
}

/// Session identity and storage selection, shared by all subcommands.
#[derive(Parser, Clone, Debug, Default)]
pub struct SessionFlags {
    /// Session token shared between cooperating processes
    /// (defaults to the parent process id)
    #[clap(long, env = "SETPKG_SESSION_TOKEN")]
    pub session: Option<String>,

    /// Activation state storage: "env" or "file"
    #[clap(long, default_value = "env", env = "SETPKG_STORAGE")]
    pub storage: String,
}

impl SessionFlags {
    /// Open a session over the inherited process environment.
    pub fn open(&self) -> Result<setpkg::Session> {
        let id = match &self.session {
            Some(token) => setpkg::SessionId::from_token(token.clone()),
            None => setpkg::SessionId::from_parent_process(),
        };
        let kind = setpkg::StorageKind::from_name(&self.storage).ok_or_else(|| {
            miette::miette!("unknown storage strategy {:?} (expected env or file)", self.storage)
        })?;
        let environ: setpkg::Environ = std::env::vars().collect();
        Ok(setpkg::Session::new(id, environ, kind)?)
    }
}

/// Resolve the shell dialect argument.
pub fn parse_shell(name: &str) -> Result<setpkg::Shell> {
    name.parse::<setpkg::Shell>()
        .map_err(|err| miette::miette!("{err}"))
}

/// Report a package-level failure on stderr without aborting the run.
pub fn report_package_error(err: setpkg::Error) {
    eprintln!("{:?}", miette::Report::new(err));
}

#[derive(Subcommand)]
enum Command {
    /// Activate packages in the current shell
    Set(CmdSet),

    /// Deactivate packages, undoing their environment changes
    Unset(CmdUnset),

    /// List available or active packages
    List(CmdList),

    /// Display information about one package
    Info(CmdInfo),

    /// Emit shell aliases declared by package files
    Alias(CmdAlias),
}

impl Opt {
    fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        // Dispatch to command
        match self.cmd {
            Command::Set(mut cmd) => cmd.run(),
            Command::Unset(mut cmd) => cmd.run(),
            Command::List(mut cmd) => cmd.run(),
            Command::Info(mut cmd) => cmd.run(),
            Command::Alias(mut cmd) => cmd.run(),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
