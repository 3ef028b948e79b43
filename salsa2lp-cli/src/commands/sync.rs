//! `salsa2lp-sync sync` — run the batch and print a summary.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_core::tool::{ProcessRunner, ToolRunner};
use salsa2lp_remote::{http_agent, LaunchpadClient};
use salsa2lp_runtime::{init_tracing, start_blocking, RunOptions};
use salsa2lp_sync::{
    BatchReport, Collaborators, ErrorKind, GitCli, PublishOutcome, SalsaSource, SyncEngine,
    UscanDownloader, Vcs,
};

use super::ConfigArgs;

/// Arguments for `salsa2lp-sync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync only this project (its group comes from Packages.txt, else the default group).
    pub project: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Packages processed concurrently [default: from config, 1]
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl SyncArgs {
    pub fn run(self) -> Result<ExitCode> {
        init_tracing(self.config.verbose);
        let mut config = self.config.load()?;
        if let Some(jobs) = self.jobs {
            config.jobs = jobs.max(1);
        }
        let overrides = super::load_overrides(&config)?;
        let cancel = CancelFlag::new();
        let agent = http_agent();

        let credentials = super::obtain_credentials(&config, agent.clone(), &cancel)?;

        let packages = match self.project.as_deref() {
            Some(project) => vec![overrides.resolve(project)],
            None => super::discover(&config, &overrides, agent.clone())?,
        };
        if packages.is_empty() {
            println!("Nothing to sync.");
            return Ok(ExitCode::SUCCESS);
        }

        let tools: Arc<dyn ToolRunner> = Arc::new(ProcessRunner::new(cancel.clone()));
        let vcs: Arc<dyn Vcs> = Arc::new(GitCli::new(Arc::clone(&tools)));
        let collaborators = Collaborators {
            source: Arc::new(SalsaSource::new(config.source_host.clone(), Arc::clone(&vcs))),
            downloader: Arc::new(UscanDownloader::new(Arc::clone(&tools))),
            hosting: Arc::new(LaunchpadClient::new(agent, credentials)),
            vcs,
            tools,
        };

        let options = RunOptions {
            jobs: config.jobs,
            handle_interrupt: true,
        };
        let engine = SyncEngine::new(config, collaborators)
            .context("failed to load commit and recipe templates")?;
        let report = start_blocking(Arc::new(engine), packages, options, cancel)
            .context("batch runtime failed")?;

        print_summary(&report);
        Ok(ExitCode::from(report.exit_code()))
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "package")]
    package: String,
    #[tabled(rename = "group")]
    group: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn summary_rows(report: &BatchReport) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = report
        .reports
        .iter()
        .map(|entry| {
            let (status, detail) = match &entry.result {
                Ok(outcome) => {
                    let publish = match &outcome.publish {
                        PublishOutcome::Published { commit } => {
                            format!("pushed {}", short(commit))
                        }
                        PublishOutcome::Unchanged => "unchanged".to_string(),
                    };
                    let created = if outcome.created { ", repository created" } else { "" };
                    (
                        "ok".green().to_string(),
                        format!(
                            "{} {}: {publish}{created}, recipe {}",
                            outcome.format, outcome.version.version, outcome.recipe
                        ),
                    )
                }
                Err(err) => {
                    let status = match err.kind {
                        ErrorKind::Skipped => "skipped".yellow(),
                        ErrorKind::Failed => "failed".red(),
                        ErrorKind::Cancelled => "cancelled".dimmed(),
                    };
                    (status.to_string(), err.source.to_string())
                }
            };
            SummaryRow {
                package: entry.package.name.to_string(),
                group: entry.package.source_group.to_string(),
                status,
                detail,
            }
        })
        .collect();

    rows.extend(report.not_started.iter().map(|package| SummaryRow {
        package: package.name.to_string(),
        group: package.source_group.to_string(),
        status: "not started".dimmed().to_string(),
        detail: String::new(),
    }));
    rows
}

fn print_summary(report: &BatchReport) {
    let rows = summary_rows(report);
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    let mut parts = vec![format!("{} synced", report.succeeded())];
    if report.skipped() > 0 {
        parts.push(format!("{} skipped", report.skipped()).yellow().to_string());
    }
    if report.failed() > 0 {
        parts.push(format!("{} failed", report.failed()).red().to_string());
    }
    if report.interrupted {
        parts.push(
            format!("interrupted, {} not started", report.not_started.len())
                .bold()
                .to_string(),
        );
    }
    println!("{}", parts.join(", "));
}

fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use salsa2lp_core::types::{
        DistributionChannel, PackageName, PackageRef, PackagingFormat, VersionInfo,
    };
    use salsa2lp_sync::{PackageReport, PackageSyncError, RecipeOutcome, SyncError, SyncOutcome};

    fn ok_report(name: &str) -> PackageReport {
        PackageReport {
            package: PackageRef::new(name, "ubports-team"),
            result: Ok(SyncOutcome {
                package: PackageName::from(name),
                format: PackagingFormat::ArtifactReferencing,
                version: VersionInfo::new("1.0-1", DistributionChannel::Release),
                created: true,
                publish: PublishOutcome::Published {
                    commit: "0123456789abcdef0123".to_string(),
                },
                recipe: RecipeOutcome::Created,
            }),
        }
    }

    #[test]
    fn rows_cover_reports_then_unstarted_packages() {
        colored::control::set_override(false);
        let report = BatchReport {
            reports: vec![
                ok_report("alpha"),
                PackageReport {
                    package: PackageRef::new("bravo", "ubports-team"),
                    result: Err(PackageSyncError::new(
                        PackageName::from("bravo"),
                        SyncError::Cancelled,
                    )),
                },
            ],
            not_started: vec![PackageRef::new("charlie", "ubports-team")],
            interrupted: true,
        };

        let rows = summary_rows(&report);
        let names: Vec<&str> = rows.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(names, ["alpha", "bravo", "charlie"]);
        assert_eq!(rows[0].status, "ok");
        assert!(rows[0].detail.contains("pushed 0123456789ab"));
        assert!(rows[0].detail.contains("repository created"));
        assert_eq!(rows[1].status, "cancelled");
        assert_eq!(rows[2].status, "not started");
    }

    #[test]
    fn short_commit_handles_short_input() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short("0123456789abcdef"), "0123456789ab");
    }
}
