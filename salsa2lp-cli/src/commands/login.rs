//! `salsa2lp-sync login` — authorize once, then confirm who we are.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_remote::{http_agent, LaunchpadClient};
use salsa2lp_runtime::init_tracing;
use salsa2lp_sync::HostingApi;

use super::ConfigArgs;

/// Arguments for `salsa2lp-sync login`.
#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl LoginArgs {
    pub fn run(self) -> Result<ExitCode> {
        init_tracing(self.config.verbose);
        let config = self.config.load()?;
        let agent = http_agent();

        let credentials = super::obtain_credentials(&config, agent.clone(), &CancelFlag::new())?;
        let client = LaunchpadClient::new(agent, credentials);
        let name = client
            .identity()
            .context("stored credentials were not accepted by Launchpad")?;

        println!(
            "Authenticated as {} (credentials in {})",
            name.bold(),
            config.credential_path.display()
        );
        Ok(ExitCode::SUCCESS)
    }
}
