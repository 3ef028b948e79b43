//! Error types for salsa2lp-sync.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use salsa2lp_core::types::PackageName;
use salsa2lp_core::ToolError;
use salsa2lp_detector::ClassifyError;
use salsa2lp_renderer::RenderError;

use crate::hosting::HostingError;

/// Errors from workspace management and artifact extraction.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The package name cannot be used as a directory name.
    #[error("package name {name:?} is not usable as a workspace directory")]
    InvalidName { name: String },

    /// Another attempt currently holds the workspace for this package.
    #[error("workspace for {package} is already in use")]
    WorkspaceBusy { package: PackageName },

    /// No accepted artifact was found after download.
    #[error("no upstream artifact (*.tar.xz, *.tar.bz2, *.tar.gz) in {}", dir.display())]
    ArtifactNotFound { dir: PathBuf },

    /// The artifact is empty, corrupt, or lacks a common top-level directory.
    #[error("unusable archive {}: {reason}", archive.display())]
    ArchiveFormat { archive: PathBuf, reason: String },

    /// An archive member tries to escape the extraction directory.
    #[error("path traversal in {}: {entry}", archive.display())]
    PathTraversal { archive: PathBuf, entry: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from combining packaging metadata with the upstream tree.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Two contributions claim the same path.
    #[error("merge conflict at {}", path.display())]
    Conflict { path: PathBuf },

    /// The format needs an extracted artifact but none was supplied.
    #[error("artifact-referencing package merged without an extracted artifact")]
    MissingArtifact,

    /// The packaging source has no packaging-metadata directory.
    #[error("packaging directory missing at {}", path.display())]
    MissingPackaging { path: PathBuf },

    #[error("failed to walk tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from version-control operations.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The command ran but reported failure.
    #[error("git {operation} failed: {diagnostic}")]
    Failed {
        operation: &'static str,
        diagnostic: String,
    },

    /// The remote refused the pushed update.
    #[error("push rejected by remote: {diagnostic}")]
    Rejected { diagnostic: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the upstream artifact download tool.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("artifact download failed: {diagnostic}")]
    Failed { diagnostic: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure of a single package attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: VcsError,
    },

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    /// A destination-side git step failed (init, fetch, commit, push).
    #[error("destination {operation} failed: {source}")]
    Vcs {
        operation: &'static str,
        #[source]
        source: VcsError,
    },

    #[error("publish rejected: {diagnostic}")]
    PublishRejected { diagnostic: String },

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error("access token expired at {expired_at}")]
    TokenExpired { expired_at: DateTime<Utc> },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("cancelled")]
    Cancelled,
}

/// How the batch treats a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The packaging source is unusable; the package is left alone.
    Skipped,
    /// Destination-side failure; counts against the exit status.
    Failed,
    /// Operator interrupt.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Skipped => write!(f, "skipped"),
            ErrorKind::Failed => write!(f, "failed"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::Classify(ClassifyError::Tool(ToolError::Cancelled { .. }))
            | SyncError::Download(DownloadError::Tool(ToolError::Cancelled { .. })) => {
                ErrorKind::Cancelled
            }
            SyncError::Clone { .. } | SyncError::Classify(_) | SyncError::Download(_) => {
                ErrorKind::Skipped
            }
            SyncError::Staging(
                StagingError::ArtifactNotFound { .. }
                | StagingError::ArchiveFormat { .. }
                | StagingError::PathTraversal { .. },
            ) => ErrorKind::Skipped,
            SyncError::Staging(_)
            | SyncError::Merge(_)
            | SyncError::Vcs { .. }
            | SyncError::PublishRejected { .. }
            | SyncError::Hosting(_)
            | SyncError::TokenExpired { .. }
            | SyncError::Render(_) => ErrorKind::Failed,
        }
    }
}

/// A failed attempt, tagged with the package and its classification.
#[derive(Debug, Error)]
#[error("{package}: {source}")]
pub struct PackageSyncError {
    pub package: PackageName,
    pub kind: ErrorKind,
    #[source]
    pub source: SyncError,
}

impl PackageSyncError {
    pub fn new(package: PackageName, source: SyncError) -> Self {
        Self {
            package,
            kind: source.kind(),
            source,
        }
    }

    /// Same error, reclassified as cancelled.
    pub fn cancelled(package: PackageName, source: SyncError) -> Self {
        Self {
            package,
            kind: ErrorKind::Cancelled,
            source,
        }
    }
}

/// Convenience constructor for [`StagingError::Io`].
pub(crate) fn staging_io(path: impl Into<PathBuf>, source: std::io::Error) -> StagingError {
    StagingError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`MergeError::Io`].
pub(crate) fn merge_io(path: impl Into<PathBuf>, source: std::io::Error) -> MergeError {
    MergeError::Io {
        path: path.into(),
        source,
    }
}
