//! Per-package pipeline and batch reporting.
//!
//! ## `sync_package` — step order
//!
//! 1. Lease a staging workspace.
//! 2. Check out the packaging source, classify it.
//! 3. Download and extract the upstream artifact (artifact-referencing only).
//! 4. Open the destination repository (discover / create / fetch).
//! 5. Stage the merged tree, commit if new or dirty, push.
//! 6. Synchronise the build recipe.
//! 7. Release the workspace, on every exit path.
//!
//! Steps 2–3 only touch the packaging side, so a package whose source is
//! unusable is skipped before anything is created at the destination.

use std::sync::Arc;

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_core::config::SyncConfig;
use salsa2lp_core::tool::ToolRunner;
use salsa2lp_core::types::{PackageName, PackageRef, PackagingFormat, VersionInfo};
use salsa2lp_detector::classify;
use salsa2lp_renderer::{CommitContext, RenderError, Renderer};

use crate::download::ArtifactDownloader;
use crate::error::{ErrorKind, PackageSyncError, SyncError};
use crate::extract::locate_artifact;
use crate::hosting::HostingApi;
use crate::reconcile::{PublishOutcome, RepositoryReconciler};
use crate::recipe::{RecipeOutcome, RecipeSynchronizer};
use crate::source::PackagingSource;
use crate::staging::{StagingArea, StagingWorkspace};
use crate::vcs::Vcs;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External capabilities the engine is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn PackagingSource>,
    pub downloader: Arc<dyn ArtifactDownloader>,
    pub hosting: Arc<dyn HostingApi>,
    pub vcs: Arc<dyn Vcs>,
    /// Runs `dpkg-source` for format queries.
    pub tools: Arc<dyn ToolRunner>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A successful package attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub package: PackageName,
    pub format: PackagingFormat,
    pub version: VersionInfo,
    /// Destination repository was created by this attempt.
    pub created: bool,
    pub publish: PublishOutcome,
    pub recipe: RecipeOutcome,
}

/// Result of one package within a batch.
#[derive(Debug)]
pub struct PackageReport {
    pub package: PackageRef,
    pub result: Result<SyncOutcome, PackageSyncError>,
}

/// Results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub reports: Vec<PackageReport>,
    /// Packages never started because the batch was interrupted.
    pub not_started: Vec<PackageRef>,
    pub interrupted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn skipped(&self) -> usize {
        self.count_kind(ErrorKind::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count_kind(ErrorKind::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count_kind(ErrorKind::Cancelled)
    }

    fn count_kind(&self, kind: ErrorKind) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(&r.result, Err(e) if e.kind == kind))
            .count()
    }

    /// Process exit status: 130 when interrupted, 1 when any package
    /// failed, 0 otherwise (skips are clean).
    pub fn exit_code(&self) -> u8 {
        if self.interrupted || self.cancelled() > 0 {
            130
        } else if self.failed() > 0 {
            1
        } else {
            0
        }
    }
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// The per-package synchronisation engine.
pub struct SyncEngine {
    config: SyncConfig,
    staging: StagingArea,
    collaborators: Collaborators,
    renderer: Renderer,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Result<Self, RenderError> {
        Ok(Self {
            staging: StagingArea::new(&config.staging_root),
            config,
            collaborators,
            renderer: Renderer::new()?,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Run one package attempt. The workspace is gone when this returns.
    pub fn sync_package(
        &self,
        package: &PackageRef,
        cancel: &CancelFlag,
    ) -> Result<SyncOutcome, PackageSyncError> {
        let fail = |source: SyncError| {
            if cancel.is_cancelled() {
                PackageSyncError::cancelled(package.name.clone(), source)
            } else {
                PackageSyncError::new(package.name.clone(), source)
            }
        };

        if cancel.is_cancelled() {
            return Err(fail(SyncError::Cancelled));
        }
        let workspace = self.staging.acquire(package).map_err(|e| fail(e.into()))?;
        let attempt = self.attempt(&workspace, package, cancel);
        let released = workspace.release();

        match (attempt, released) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(fail(e.into())),
            (Err(e), released) => {
                if let Err(release_err) = released {
                    tracing::warn!("{}: {release_err}", package.name);
                }
                Err(fail(e))
            }
        }
    }

    fn attempt(
        &self,
        workspace: &StagingWorkspace,
        package: &PackageRef,
        cancel: &CancelFlag,
    ) -> Result<SyncOutcome, SyncError> {
        let name = &package.name;
        let source_dir = workspace.source_dir();

        let checkout = self
            .collaborators
            .source
            .checkout(package, &source_dir)
            .map_err(|source| SyncError::Clone {
                url: self.collaborators.source.url(package),
                source,
            })?;
        checkpoint(cancel)?;

        let classification = classify(&source_dir, self.collaborators.tools.as_ref())?;
        let format = classification.format;
        let version = classification.version;
        tracing::info!(
            "{name}: {format} {} ({})",
            version.version,
            version.channel
        );
        checkpoint(cancel)?;

        let extracted = if format.needs_artifact() {
            let artifacts = workspace.artifacts_dir();
            self.collaborators.downloader.fetch(&source_dir, &artifacts)?;
            let (archive, kind) = locate_artifact(&artifacts)?;
            Some(workspace.extract_artifact(&archive, kind)?)
        } else {
            None
        };
        checkpoint(cancel)?;

        let reconciler = RepositoryReconciler::new(
            &self.config,
            self.collaborators.hosting.as_ref(),
            self.collaborators.vcs.as_ref(),
        );
        let dest_dir = workspace.dest_dir();
        let destination = reconciler.open(name, &dest_dir)?;
        checkpoint(cancel)?;

        reconciler.stage_tree(&dest_dir, format, &source_dir, extracted.as_ref())?;
        let message = self.renderer.render_commit_message(&CommitContext::new(
            &self.config.source_host,
            name,
            &version,
            &checkout.commit,
        ))?;
        checkpoint(cancel)?;
        let publish = reconciler.commit_and_publish(&destination, &dest_dir, &message)?;
        if publish == PublishOutcome::Unchanged {
            tracing::info!("{name}: destination already up to date");
        }

        let recipe = RecipeSynchronizer::new(
            &self.config,
            self.collaborators.hosting.as_ref(),
            &self.renderer,
        )
        .sync(&self.config.team, name, &version)?;

        Ok(SyncOutcome {
            package: name.clone(),
            format,
            version,
            created: destination.is_new,
            publish,
            recipe,
        })
    }

    /// Process `packages` one after another, stopping at cancellation.
    pub fn run_sequential(&self, packages: &[PackageRef], cancel: &CancelFlag) -> BatchReport {
        let mut report = BatchReport::default();
        for (idx, package) in packages.iter().enumerate() {
            if cancel.is_cancelled() {
                report.interrupted = true;
                report.not_started = packages[idx..].to_vec();
                break;
            }
            let result = self.sync_package(package, cancel);
            log_result(package, &result);
            report.reports.push(PackageReport {
                package: package.clone(),
                result,
            });
        }
        if cancel.is_cancelled() {
            report.interrupted = true;
        }
        report
    }
}

fn checkpoint(cancel: &CancelFlag) -> Result<(), SyncError> {
    cancel.check().map_err(|_| SyncError::Cancelled)
}

/// Log a package result at the level its kind deserves.
pub fn log_result(package: &PackageRef, result: &Result<SyncOutcome, PackageSyncError>) {
    match result {
        Ok(outcome) => tracing::info!(
            "{}: done ({}, recipe {})",
            package,
            match &outcome.publish {
                PublishOutcome::Published { commit } => format!("published {commit}"),
                PublishOutcome::Unchanged => "unchanged".to_string(),
            },
            outcome.recipe
        ),
        Err(e) => match e.kind {
            ErrorKind::Skipped => tracing::warn!("skipping {package}: {}", e.source),
            ErrorKind::Failed => tracing::error!("{package} failed: {}", e.source),
            ErrorKind::Cancelled => tracing::warn!("{package}: aborted"),
        },
    }
}
