//! Upstream artifact download.

use std::path::Path;
use std::sync::Arc;

use salsa2lp_core::tool::{Invocation, ToolRunner};

use crate::error::DownloadError;

/// Downloads the upstream artifact referenced by a packaging tree.
pub trait ArtifactDownloader: Send + Sync {
    /// Place the artifact for the packaging tree `tree` into `dest`.
    fn fetch(&self, tree: &Path, dest: &Path) -> Result<(), DownloadError>;
}

/// Runs `uscan` against the tree's `debian/watch`.
#[derive(Clone)]
pub struct UscanDownloader {
    runner: Arc<dyn ToolRunner>,
}

impl UscanDownloader {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    pub(crate) fn invocation(tree: &Path, dest: &Path) -> Invocation {
        Invocation::new("uscan")
            .args([
                "--noconf",
                "--rename",
                "--download-current-version",
            ])
            .arg(format!("--destdir={}", dest.display()))
            .cwd(tree)
    }
}

impl ArtifactDownloader for UscanDownloader {
    fn fetch(&self, tree: &Path, dest: &Path) -> Result<(), DownloadError> {
        let output = self.runner.run(&Self::invocation(tree, dest))?;
        if !output.success() {
            return Err(DownloadError::Failed {
                diagnostic: output.diagnostic(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn invocation_downloads_current_version_into_dest() {
        let inv = UscanDownloader::invocation(&PathBuf::from("/w/source"), &PathBuf::from("/w/artifacts"));
        assert_eq!(inv.program, "uscan");
        assert!(inv.args.contains(&"--download-current-version".to_string()));
        assert!(inv.args.contains(&"--destdir=/w/artifacts".to_string()));
        assert_eq!(inv.cwd, Some(PathBuf::from("/w/source")));
    }
}
