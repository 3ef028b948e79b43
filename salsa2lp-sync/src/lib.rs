//! # salsa2lp-sync
//!
//! The per-package synchronisation engine.
//!
//! Build a [`SyncEngine`] from a [`salsa2lp_core::SyncConfig`] and a set of
//! [`Collaborators`], then call [`SyncEngine::sync_package`] for one package
//! or [`SyncEngine::run_sequential`] for a batch.
//!
//! - [`staging`] — exclusive per-package workspaces
//! - [`extract`] — artifact selection and tarball extraction
//! - [`merge`] — format-dependent tree merge
//! - [`reconcile`] — destination repository state machine
//! - [`recipe`] — idempotent build recipe updates
//! - [`vcs`], [`source`], [`download`], [`hosting`] — collaborator traits and
//!   their `git` / `uscan` implementations

pub mod download;
pub mod error;
pub mod extract;
pub mod hosting;
pub mod merge;
pub mod pipeline;
pub mod recipe;
pub mod reconcile;
pub mod source;
pub mod staging;
pub mod vcs;

#[cfg(feature = "test-support")]
pub mod testing;

pub use download::{ArtifactDownloader, UscanDownloader};
pub use error::{
    DownloadError, ErrorKind, MergeError, PackageSyncError, StagingError, SyncError, VcsError,
};
pub use extract::{CompressionKind, ExtractedTree};
pub use hosting::{
    AccessToken, HostingApi, HostingError, NewRecipe, RemoteRecipe, RemoteRepository, TokenScope,
};
pub use merge::MergedTree;
pub use pipeline::{BatchReport, Collaborators, PackageReport, SyncEngine, SyncOutcome};
pub use recipe::{RecipeOutcome, RecipeSynchronizer};
pub use reconcile::{DestinationRepository, PublishOutcome, RepositoryReconciler};
pub use source::{Checkout, PackagingSource, SalsaSource};
pub use staging::{StagingArea, StagingWorkspace};
pub use vcs::{GitCli, Vcs};
