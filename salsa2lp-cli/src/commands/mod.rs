//! Subcommands and the flags they share.

pub mod login;
pub mod packages;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_core::config::{self, APP_NAME};
use salsa2lp_core::{Overrides, PackageRef, SyncConfig};
use salsa2lp_remote::{
    CredentialStore, Credentials, Discovery, ExchangePolicy, HttpTokenEndpoint, SalsaDiscovery,
};

/// Flags layered over `~/.config/salsa2lp-sync/config.yaml`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Launchpad team owning the repositories and the PPA [default: lomiri]
    #[arg(short, long)]
    pub team: Option<String>,

    /// PPA the daily builds go to [default: builds]
    #[arg(short, long)]
    pub ppa: Option<String>,

    /// Distribution series new recipes target [default: 24.04]
    #[arg(long)]
    pub series: Option<String>,

    /// Parent directory of the per-package workspaces.
    #[arg(long, value_name = "DIR")]
    pub staging_root: Option<PathBuf>,

    /// Log progress (RUST_LOG overrides).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<SyncConfig> {
        let mut config = config::load().context("failed to load configuration")?;
        if let Some(team) = &self.team {
            config.team = team.clone();
        }
        if let Some(ppa) = &self.ppa {
            config.ppa_name = ppa.clone();
        }
        if let Some(series) = &self.series {
            config.target_series = series.clone();
        }
        if let Some(root) = &self.staging_root {
            config.staging_root = root.clone();
        }
        config.validate().context("invalid command-line option")?;
        Ok(config)
    }
}

pub fn load_overrides(config: &SyncConfig) -> Result<Overrides> {
    Overrides::load(&config.overrides_path, config.default_source_group.as_str())
        .with_context(|| format!("failed to read {}", config.overrides_path.display()))
}

/// All projects of the default group, merged with the override entries.
pub fn discover(
    config: &SyncConfig,
    overrides: &Overrides,
    agent: ureq::Agent,
) -> Result<Vec<PackageRef>> {
    let discovery = SalsaDiscovery::new(
        agent,
        &config.source_host,
        overrides.default_group().clone(),
    );
    let discovered = discovery.list_packages().with_context(|| {
        format!(
            "failed to list projects of {} on {}",
            overrides.default_group(),
            config.source_host
        )
    })?;
    Ok(overrides.augment(discovered))
}

/// Stored credentials, or run the browser authorization when there are none.
pub fn obtain_credentials(
    config: &SyncConfig,
    agent: ureq::Agent,
    cancel: &CancelFlag,
) -> Result<Credentials> {
    let store = CredentialStore::new(&config.credential_path, APP_NAME);
    store
        .obtain(
            &HttpTokenEndpoint::new(agent),
            ExchangePolicy::default(),
            cancel,
            |url| {
                println!(
                    "\nOpen this link in a browser and grant {} access:\n\n    {}\n",
                    "Change Anything".bold(),
                    url.underline()
                );
                println!("{}", "Waiting for authorization...".dimmed());
            },
        )
        .with_context(|| {
            format!(
                "failed to obtain Launchpad credentials (stored at {})",
                config.credential_path.display()
            )
        })
}
