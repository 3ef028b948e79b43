//! Packaging source checkout.

use std::path::Path;
use std::sync::Arc;

use salsa2lp_core::types::PackageRef;

use crate::error::VcsError;
use crate::vcs::Vcs;

/// A checked-out packaging source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub url: String,
    /// Head commit at checkout time; recorded in destination commits.
    pub commit: String,
}

/// Produces a local checkout of a package's packaging repository.
pub trait PackagingSource: Send + Sync {
    /// Where `package` is fetched from.
    fn url(&self, package: &PackageRef) -> String;

    /// Check `package` out into the empty directory `dest`.
    fn checkout(&self, package: &PackageRef, dest: &Path) -> Result<Checkout, VcsError>;
}

/// Clones `https://<host>/<group>/<name>.git`.
#[derive(Clone)]
pub struct SalsaSource {
    host: String,
    vcs: Arc<dyn Vcs>,
}

impl SalsaSource {
    pub fn new(host: impl Into<String>, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            host: host.into(),
            vcs,
        }
    }
}

impl PackagingSource for SalsaSource {
    fn url(&self, package: &PackageRef) -> String {
        format!(
            "https://{}/{}/{}.git",
            self.host, package.source_group, package.name
        )
    }

    fn checkout(&self, package: &PackageRef, dest: &Path) -> Result<Checkout, VcsError> {
        let url = self.url(package);
        tracing::info!("{}: cloning {url}", package.name);
        self.vcs.clone_repo(&url, dest)?;
        let commit = self.vcs.head_commit(dest)?;
        Ok(Checkout { url, commit })
    }
}
