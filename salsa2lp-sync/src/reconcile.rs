//! Destination repository reconciliation.
//!
//! ```text
//! Discover ─┬─ absent ──▶ Create ────────┐
//!           └─ present ─▶ FetchExisting ─┴─▶ StageTree ─▶ CommitIfDirty ─▶ Publish
//!                                                              └─ clean ─▶ NoOp
//! ```
//!
//! Access tokens are issued per attempt, checked before fetch and before
//! push, and never stored beyond the [`DestinationRepository`] handle.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use salsa2lp_core::config::SyncConfig;
use salsa2lp_core::types::{PackageName, PackagingFormat};

use crate::error::{SyncError, VcsError};
use crate::extract::ExtractedTree;
use crate::hosting::{AccessToken, HostingApi, RemoteRepository, TokenScope};
use crate::merge::{clear_except_vcs, merge_into, MergedTree};
use crate::vcs::Vcs;

/// Name of the git remote pointing at the destination.
pub const REMOTE_NAME: &str = "destination";

/// Scopes requested for every destination token.
pub const TOKEN_SCOPES: [TokenScope; 2] = [TokenScope::Push, TokenScope::Pull];

const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

// ---------------------------------------------------------------------------
// DestinationRepository
// ---------------------------------------------------------------------------

/// Handle to the destination repository for one attempt.
pub struct DestinationRepository {
    pub repository: RemoteRepository,
    /// Created during this attempt.
    pub is_new: bool,
    pub branch: String,
    remote_url: String,
    token: AccessToken,
}

impl DestinationRepository {
    /// Remote URL embedding the attempt's access token.
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at
    }

    /// `TokenExpired` once the attempt's token is no longer valid.
    pub fn ensure_token_valid(&self) -> Result<(), SyncError> {
        if self.token.is_expired(Utc::now()) {
            return Err(SyncError::TokenExpired {
                expired_at: self.token.expires_at,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for DestinationRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationRepository")
            .field("path", &self.repository.path)
            .field("is_new", &self.is_new)
            .field("branch", &self.branch)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Result of the commit/publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { commit: String },
    /// Nothing changed; no commit, no push.
    Unchanged,
}

// ---------------------------------------------------------------------------
// RepositoryReconciler
// ---------------------------------------------------------------------------

/// Drives one package's destination repository through the state machine.
pub struct RepositoryReconciler<'a> {
    config: &'a SyncConfig,
    hosting: &'a dyn HostingApi,
    vcs: &'a dyn Vcs,
}

fn vcs_step(operation: &'static str) -> impl FnOnce(VcsError) -> SyncError {
    move |source| SyncError::Vcs { operation, source }
}

impl<'a> RepositoryReconciler<'a> {
    pub fn new(config: &'a SyncConfig, hosting: &'a dyn HostingApi, vcs: &'a dyn Vcs) -> Self {
        Self {
            config,
            hosting,
            vcs,
        }
    }

    /// Discover (or create) the repository and bring `workdir` to its tip.
    pub fn open(
        &self,
        package: &PackageName,
        workdir: &Path,
    ) -> Result<DestinationRepository, SyncError> {
        let path = self.config.repository_path(package);
        let (repository, is_new) = match self.hosting.find_repository(&path)? {
            Some(repository) => (repository, false),
            None => {
                tracing::info!("{package}: creating repository {path}");
                let repository = self.hosting.create_repository(&self.config.team, package)?;
                (repository, true)
            }
        };

        let ttl = self.config.token_ttl_secs.min(MAX_TOKEN_TTL_SECS);
        let expires_at = Utc::now() + Duration::seconds(ttl as i64);
        let token = self
            .hosting
            .issue_access_token(&repository, &TOKEN_SCOPES, expires_at)?;
        let user = self.hosting.identity()?;
        let remote_url = format!(
            "https://{user}:{}@{}/{}",
            token.secret, self.config.git_host, repository.path
        );
        let destination = DestinationRepository {
            repository,
            is_new,
            branch: self.config.default_branch.clone(),
            remote_url,
            token,
        };

        self.vcs
            .init(workdir, &destination.branch)
            .map_err(vcs_step("init"))?;
        self.vcs
            .add_remote(workdir, REMOTE_NAME, destination.remote_url())
            .map_err(vcs_step("remote add"))?;
        if !is_new {
            destination.ensure_token_valid()?;
            tracing::debug!("{package}: fetching {}", destination.repository.path);
            self.vcs
                .fetch_and_checkout(workdir, REMOTE_NAME, &destination.branch)
                .map_err(vcs_step("fetch"))?;
        }
        Ok(destination)
    }

    /// Replace the working tree (except `.git/`) with the merged tree.
    pub fn stage_tree(
        &self,
        workdir: &Path,
        format: PackagingFormat,
        source: &Path,
        artifact: Option<&ExtractedTree>,
    ) -> Result<MergedTree, SyncError> {
        clear_except_vcs(workdir)?;
        Ok(merge_into(format, source, artifact, workdir)?)
    }

    /// Commit when new or dirty, then push. Otherwise do nothing.
    pub fn commit_and_publish(
        &self,
        destination: &DestinationRepository,
        workdir: &Path,
        message: &str,
    ) -> Result<PublishOutcome, SyncError> {
        let dirty = self.vcs.is_dirty(workdir).map_err(vcs_step("status"))?;
        if !destination.is_new && !dirty {
            return Ok(PublishOutcome::Unchanged);
        }

        let commit = self
            .vcs
            .commit_all(workdir, message, &self.config.committer)
            .map_err(vcs_step("commit"))?;
        destination.ensure_token_valid()?;
        tracing::info!("pushing {commit} to {}", destination.repository.path);
        match self.vcs.push(workdir, REMOTE_NAME, &destination.branch) {
            Ok(()) => Ok(PublishOutcome::Published { commit }),
            Err(VcsError::Rejected { diagnostic }) => Err(SyncError::PublishRejected { diagnostic }),
            Err(source) => Err(SyncError::Vcs {
                operation: "push",
                source,
            }),
        }
    }
}
