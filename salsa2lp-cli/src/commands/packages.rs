//! `salsa2lp-sync packages` — what a full sync would process.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use salsa2lp_core::{Overrides, PackageRef};
use salsa2lp_remote::http_agent;
use salsa2lp_runtime::init_tracing;

use super::ConfigArgs;

/// Arguments for `salsa2lp-sync packages`.
#[derive(Args, Debug)]
pub struct PackagesArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// List only the Packages.txt entries; no network access.
    #[arg(long)]
    pub overrides_only: bool,
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "package")]
    package: String,
    #[tabled(rename = "group")]
    group: String,
    #[tabled(rename = "origin")]
    origin: &'static str,
}

impl PackagesArgs {
    pub fn run(self) -> Result<ExitCode> {
        init_tracing(self.config.verbose);
        let config = self.config.load()?;
        let overrides = super::load_overrides(&config)?;

        let packages = if self.overrides_only {
            overrides.entries().to_vec()
        } else {
            super::discover(&config, &overrides, http_agent())?
        };

        if packages.is_empty() {
            println!("No packages.");
            return Ok(ExitCode::SUCCESS);
        }
        let count = packages.len();
        let mut table = Table::new(rows(&overrides, packages));
        table.with(Style::rounded());
        println!("{table}");
        println!("{count} package(s)");
        Ok(ExitCode::SUCCESS)
    }
}

fn rows(overrides: &Overrides, packages: Vec<PackageRef>) -> Vec<PackageRow> {
    packages
        .into_iter()
        .map(|p| {
            let origin = if overrides.entries().iter().any(|e| e.name == p.name) {
                "Packages.txt"
            } else {
                "discovered"
            };
            PackageRow {
                package: p.name.to_string(),
                group: p.source_group.to_string(),
                origin,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_marks_override_entries() {
        let overrides = Overrides::parse(
            "lomiri-ui-toolkit ubports-team/core\n",
            "ubports-team",
            std::path::Path::new("Packages.txt"),
        )
        .expect("parse");
        let packages = overrides.augment(vec![
            PackageRef::new("lomiri", "ubports-team"),
            PackageRef::new("lomiri-ui-toolkit", "ubports-team"),
        ]);

        let rows = rows(&overrides, packages);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].origin, "discovered");
        assert_eq!(rows[1].group, "ubports-team/core");
        assert_eq!(rows[1].origin, "Packages.txt");
    }
}
