//! salsa2lp-sync — synchronise packaging from Salsa to Launchpad.
//!
//! # Usage
//!
//! ```text
//! salsa2lp-sync sync [PROJECT] [-t TEAM] [-p PPA] [-j JOBS] [--series S] [-v]
//! salsa2lp-sync login
//! salsa2lp-sync packages [--overrides-only]
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{login::LoginArgs, packages::PackagesArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "salsa2lp-sync",
    version,
    about = "Synchronise projects from Salsa to Launchpad",
    long_about = None,
    after_help = "The first run prints a Launchpad link; open it in a browser (on any system) \
                  and grant 'Change Anything' access. Without PROJECT, `sync` processes every \
                  project of the default Salsa group plus the entries of \
                  ~/.config/salsa2lp-sync/Packages.txt.",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge packaging with upstream sources and publish to Launchpad.
    Sync(SyncArgs),

    /// Obtain (or verify) Launchpad credentials.
    Login(LoginArgs),

    /// List the packages a full sync would process.
    Packages(PackagesArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Login(args) => args.run(),
        Commands::Packages(args) => args.run(),
    }
}
