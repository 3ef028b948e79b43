//! Tree merging: packaging metadata + extracted upstream source.
//!
//! | Format               | Merged tree                                              |
//! |----------------------|----------------------------------------------------------|
//! | self-contained       | packaging source minus `.git/`                           |
//! | artifact-referencing | upstream tree minus its `debian/`, plus source `debian/` |
//!
//! Merging writes into the destination working copy, which the caller has
//! cleared except for `.git/`. Every file path may be claimed by exactly one
//! contribution; a second claim is a [`MergeError::Conflict`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use salsa2lp_core::types::PackagingFormat;

use crate::error::{merge_io, MergeError};
use crate::extract::ExtractedTree;

/// Version-control metadata directory, never merged or published.
pub const VCS_DIR: &str = ".git";

/// Packaging-metadata directory.
pub const PACKAGING_DIR: &str = "debian";

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTree {
    pub root: PathBuf,
    /// Files and symlinks written.
    pub files: usize,
}

/// Merge `source` (and `artifact`, when the format needs one) into `dest`.
pub fn merge_into(
    format: PackagingFormat,
    source: &Path,
    artifact: Option<&ExtractedTree>,
    dest: &Path,
) -> Result<MergedTree, MergeError> {
    let mut claimed = BTreeSet::new();
    let files = match format {
        PackagingFormat::SelfContained => {
            if artifact.is_some() {
                tracing::debug!("ignoring upstream artifact for self-contained package");
            }
            copy_tree(source, dest, Path::new(""), &[VCS_DIR], &mut claimed)?
        }
        PackagingFormat::ArtifactReferencing => {
            let artifact = artifact.ok_or(MergeError::MissingArtifact)?;
            let packaging = source.join(PACKAGING_DIR);
            if !packaging.is_dir() {
                return Err(MergeError::MissingPackaging { path: packaging });
            }
            let upstream = copy_tree(
                &artifact.root,
                dest,
                Path::new(""),
                &[VCS_DIR, PACKAGING_DIR],
                &mut claimed,
            )?;
            upstream + copy_tree(&packaging, dest, Path::new(PACKAGING_DIR), &[], &mut claimed)?
        }
    };
    Ok(MergedTree {
        root: dest.to_path_buf(),
        files,
    })
}

/// Copy everything below `src` to `dest/<prefix>/`, skipping top-level
/// names in `exclude`. Returns the number of non-directory entries copied.
pub(crate) fn copy_tree(
    src: &Path,
    dest: &Path,
    prefix: &Path,
    exclude: &[&str],
    claimed: &mut BTreeSet<PathBuf>,
) -> Result<usize, MergeError> {
    let mut copied = 0usize;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && exclude.iter().any(|x| e.file_name() == *x)));

    for entry in walker {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let rel = prefix.join(rel);
        let target = dest.join(&rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            match fs::symlink_metadata(&target) {
                Ok(meta) if !meta.is_dir() => return Err(MergeError::Conflict { path: rel }),
                Ok(_) => {}
                Err(_) => fs::create_dir_all(&target).map_err(|e| merge_io(&target, e))?,
            }
            continue;
        }

        if !claimed.insert(rel.clone()) || fs::symlink_metadata(&target).is_ok() {
            return Err(MergeError::Conflict { path: rel });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| merge_io(parent, e))?;
        }
        if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|e| merge_io(entry.path(), e))?;
            make_symlink(&link, &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| merge_io(entry.path(), e))?;
        }
        copied += 1;
    }
    Ok(copied)
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> Result<(), MergeError> {
    std::os::unix::fs::symlink(link, target).map_err(|e| merge_io(target, e))
}

#[cfg(not(unix))]
fn make_symlink(link: &Path, target: &Path) -> Result<(), MergeError> {
    let resolved = target.parent().map(|p| p.join(link)).unwrap_or_else(|| link.to_path_buf());
    fs::copy(&resolved, target).map(|_| ()).map_err(|e| merge_io(&resolved, e))
}

/// Remove everything in `dir` except the top-level `.git/`.
pub fn clear_except_vcs(dir: &Path) -> Result<(), MergeError> {
    let entries = fs::read_dir(dir).map_err(|e| merge_io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| merge_io(dir, e))?;
        if entry.file_name() == VCS_DIR {
            continue;
        }
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .map(|t| t.is_dir())
            .map_err(|e| merge_io(&path, e))?;
        let result = if is_dir {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| merge_io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn second_claim_is_conflict() {
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        let dest = TempDir::new().expect("dest");
        write(a.path(), "src/main.c", "a");
        write(b.path(), "src/main.c", "b");

        let mut claimed = BTreeSet::new();
        copy_tree(a.path(), dest.path(), Path::new(""), &[], &mut claimed).expect("first");
        let err = copy_tree(b.path(), dest.path(), Path::new(""), &[], &mut claimed).unwrap_err();
        match err {
            MergeError::Conflict { path } => assert_eq!(path, PathBuf::from("src/main.c")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shared_directories_are_not_conflicts() {
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        let dest = TempDir::new().expect("dest");
        write(a.path(), "src/a.c", "a");
        write(b.path(), "src/b.c", "b");

        let mut claimed = BTreeSet::new();
        copy_tree(a.path(), dest.path(), Path::new(""), &[], &mut claimed).expect("first");
        copy_tree(b.path(), dest.path(), Path::new(""), &[], &mut claimed).expect("second");
        assert!(dest.path().join("src/a.c").is_file());
        assert!(dest.path().join("src/b.c").is_file());
    }

    #[test]
    fn clear_keeps_vcs_dir() {
        let dir = TempDir::new().expect("dir");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "old/file", "x");
        write(dir.path(), "top", "x");
        clear_except_vcs(dir.path()).expect("clear");
        assert!(dir.path().join(".git/HEAD").is_file());
        assert!(!dir.path().join("old").exists());
        assert!(!dir.path().join("top").exists());
    }
}
