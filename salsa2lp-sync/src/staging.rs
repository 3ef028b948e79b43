//! Per-package staging workspaces.
//!
//! # Layout
//!
//! ```text
//! <staging_root>/<package>/
//!   source/      packaging source checkout
//!   artifacts/   downloaded upstream archives
//!   upstream/    extracted upstream tree (top-level directory stripped)
//!   dest/        destination repository working copy
//! ```
//!
//! A workspace is leased to exactly one attempt. Acquisition wipes whatever a
//! previous (possibly crashed) attempt left behind; release deletes the whole
//! directory. Dropping a workspace without releasing it performs the same
//! cleanup, so every exit path leaves nothing behind.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use salsa2lp_core::types::{PackageName, PackageRef};

use crate::error::{staging_io, StagingError};
use crate::extract::{extract_archive, CompressionKind, ExtractedTree};

type Leases = Arc<Mutex<HashSet<PackageName>>>;

/// Hands out exclusive per-package workspaces under one root directory.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
    leases: Leases,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            leases: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lease a freshly wiped workspace for `package`.
    pub fn acquire(&self, package: &PackageRef) -> Result<StagingWorkspace, StagingError> {
        validate_name(&package.name)?;
        {
            let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
            if !leases.insert(package.name.clone()) {
                return Err(StagingError::WorkspaceBusy {
                    package: package.name.clone(),
                });
            }
        }

        // From here on the workspace owns the lease; dropping it on an error
        // path gives the lease back and removes the directory.
        let workspace = StagingWorkspace {
            path: self.root.join(&package.name.0),
            package: package.name.clone(),
            leases: Arc::clone(&self.leases),
            released: false,
        };
        workspace.prepare()?;
        tracing::debug!("acquired workspace {}", workspace.path.display());
        Ok(workspace)
    }

    /// Packages currently holding a workspace.
    pub fn active(&self) -> usize {
        self.leases.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn validate_name(name: &PackageName) -> Result<(), StagingError> {
    let s = name.0.as_str();
    let unsafe_name = s.is_empty()
        || s == "."
        || s == ".."
        || s.contains(['/', '\\', '\0'])
        || s.chars().any(char::is_whitespace);
    if unsafe_name {
        return Err(StagingError::InvalidName {
            name: s.to_string(),
        });
    }
    Ok(())
}

/// An exclusively leased workspace for one package attempt.
#[derive(Debug)]
pub struct StagingWorkspace {
    path: PathBuf,
    package: PackageName,
    leases: Leases,
    released: bool,
}

impl StagingWorkspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn package(&self) -> &PackageName {
        &self.package
    }

    pub fn source_dir(&self) -> PathBuf {
        self.path.join("source")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.path.join("artifacts")
    }

    pub fn upstream_dir(&self) -> PathBuf {
        self.path.join("upstream")
    }

    pub fn dest_dir(&self) -> PathBuf {
        self.path.join("dest")
    }

    /// Extract `archive` into `upstream/`, replacing any earlier extraction.
    pub fn extract_artifact(
        &self,
        archive: &Path,
        kind: CompressionKind,
    ) -> Result<ExtractedTree, StagingError> {
        let upstream = self.upstream_dir();
        remove_all(&upstream)?;
        let tree = extract_archive(archive, kind, &upstream)?;
        tracing::debug!(
            "{}: extracted {} files from {} (stripped {}/)",
            self.package,
            tree.files,
            archive.display(),
            tree.toplevel
        );
        Ok(tree)
    }

    /// Delete the workspace and give the lease back.
    pub fn release(mut self) -> Result<(), StagingError> {
        self.released = true;
        let result = remove_all(&self.path);
        self.return_lease();
        if result.is_ok() {
            tracing::debug!("released workspace {}", self.path.display());
        }
        result
    }

    fn prepare(&self) -> Result<(), StagingError> {
        remove_all(&self.path)?;
        for dir in [
            self.source_dir(),
            self.artifacts_dir(),
            self.upstream_dir(),
            self.dest_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| staging_io(&dir, e))?;
        }
        Ok(())
    }

    fn return_lease(&self) {
        self.leases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.package);
    }
}

impl Drop for StagingWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_all(&self.path) {
            tracing::warn!("failed to remove workspace {}: {e}", self.path.display());
        }
        self.return_lease();
    }
}

fn remove_all(path: &Path) -> Result<(), StagingError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(staging_io(path, e)),
    }
}
