//! Upstream artifact location and extraction.
//!
//! Archives are compressed tarballs following the source-tarball convention:
//! every member lives under one top-level directory (`pkg-1.2.3/`). That
//! directory is stripped on extraction, so the extracted tree's root is the
//! upstream source root.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tar::EntryType;

use crate::error::{staging_io, StagingError};

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// Compression kinds accepted for upstream artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    Xz,
    Bzip2,
    Gzip,
}

impl CompressionKind {
    /// Preference order when several artifacts are present.
    pub const PREFERENCE: [CompressionKind; 3] =
        [CompressionKind::Xz, CompressionKind::Bzip2, CompressionKind::Gzip];

    /// File-name suffix, including the tar part.
    pub fn suffix(self) -> &'static str {
        match self {
            CompressionKind::Xz => ".tar.xz",
            CompressionKind::Bzip2 => ".tar.bz2",
            CompressionKind::Gzip => ".tar.gz",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::PREFERENCE
            .into_iter()
            .find(|kind| name.ends_with(kind.suffix()))
    }
}

/// Wrap `reader` in the decoder for `kind`.
pub fn create_decoder<'a, R: Read + 'a>(reader: R, kind: CompressionKind) -> Box<dyn Read + 'a> {
    match kind {
        CompressionKind::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        CompressionKind::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        CompressionKind::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Pick the artifact in `dir` with the most preferred compression.
///
/// Among several artifacts of the same kind the lexicographically first
/// file name wins.
pub fn locate_artifact(dir: &Path) -> Result<(PathBuf, CompressionKind), StagingError> {
    let mut names: Vec<String> = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| staging_io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| staging_io(dir, e))?;
        let is_file = entry
            .file_type()
            .map(|t| t.is_file())
            .map_err(|e| staging_io(entry.path(), e))?;
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    for kind in CompressionKind::PREFERENCE {
        if let Some(name) = names.iter().find(|n| n.ends_with(kind.suffix())) {
            tracing::debug!("selected upstream artifact {name}");
            return Ok((dir.join(name), kind));
        }
    }
    Err(StagingError::ArtifactNotFound {
        dir: dir.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// An extracted upstream tree with its top-level directory stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    pub root: PathBuf,
    /// Name of the stripped top-level directory.
    pub toplevel: String,
    /// Number of non-directory members written.
    pub files: usize,
}

/// Extract `archive` into `dest`, stripping the common top-level directory.
pub fn extract_archive(
    archive: &Path,
    kind: CompressionKind,
    dest: &Path,
) -> Result<ExtractedTree, StagingError> {
    let file = File::open(archive).map_err(|e| staging_io(archive, e))?;
    let mut tarball = tar::Archive::new(create_decoder(BufReader::new(file), kind));
    fs::create_dir_all(dest).map_err(|e| staging_io(dest, e))?;

    let bad = |reason: String| StagingError::ArchiveFormat {
        archive: archive.to_path_buf(),
        reason,
    };

    let mut toplevel: Option<OsString> = None;
    let mut files = 0usize;

    let entries = tarball.entries().map_err(|e| bad(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| bad(e.to_string()))?;
        let entry_type = entry.header().entry_type();
        if matches!(
            entry_type,
            EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName | EntryType::GNULongLink
        ) {
            continue;
        }
        let path = entry.path().map_err(|e| bad(e.to_string()))?.into_owned();
        validate_entry_path(archive, &path)?;

        let Some((top, rest)) = split_toplevel(&path) else {
            continue;
        };
        if let Some(expected) = toplevel.as_ref().filter(|expected| **expected != top) {
            return Err(bad(format!(
                "member {} is outside top-level directory {}",
                path.display(),
                expected.to_string_lossy()
            )));
        }
        if toplevel.is_none() {
            toplevel = Some(top);
        }
        if rest.as_os_str().is_empty() {
            if entry_type.is_dir() {
                continue;
            }
            return Err(bad(format!(
                "member {} is not inside a top-level directory",
                path.display()
            )));
        }

        ensure_no_symlink_ancestor(archive, dest, &rest)?;
        let target = dest.join(&rest);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| staging_io(parent, e))?;
        }

        if entry_type.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| bad(e.to_string()))?
                .ok_or_else(|| bad(format!("hard link {} has no target", path.display())))?
                .into_owned();
            validate_entry_path(archive, &link)?;
            let source = hard_link_source(archive, dest, &link, toplevel.as_deref())?;
            fs::copy(&source, &target).map_err(|e| staging_io(&source, e))?;
        } else {
            // A later member replaces an earlier symlink instead of writing through it.
            if fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
                fs::remove_file(&target).map_err(|e| staging_io(&target, e))?;
            }
            entry.unpack(&target).map_err(|e| staging_io(&target, e))?;
        }

        if !entry_type.is_dir() {
            files += 1;
        }
    }

    match toplevel {
        Some(top) if files > 0 => Ok(ExtractedTree {
            root: dest.to_path_buf(),
            toplevel: top.to_string_lossy().into_owned(),
            files,
        }),
        _ => Err(bad("archive is empty".to_string())),
    }
}

/// First normal component and the remainder, ignoring `./` prefixes.
fn split_toplevel(path: &Path) -> Option<(OsString, PathBuf)> {
    let mut components = path.components().filter(|c| !matches!(c, Component::CurDir));
    match components.next() {
        Some(Component::Normal(first)) => Some((first.to_os_string(), components.collect())),
        _ => None,
    }
}

/// Reject absolute paths and `..` components.
fn validate_entry_path(archive: &Path, path: &Path) -> Result<(), StagingError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(StagingError::PathTraversal {
            archive: archive.to_path_buf(),
            entry: path.display().to_string(),
        });
    }
    Ok(())
}

/// Resolve a hard-link target to a regular file already extracted under
/// `dest`. Targets outside the top-level directory, through a symlink, or
/// naming a symlink are refused: copying them would read outside `dest`.
fn hard_link_source(
    archive: &Path,
    dest: &Path,
    link: &Path,
    toplevel: Option<&OsStr>,
) -> Result<PathBuf, StagingError> {
    let traversal = || StagingError::PathTraversal {
        archive: archive.to_path_buf(),
        entry: link.display().to_string(),
    };
    let Some((top, rest)) = split_toplevel(link) else {
        return Err(traversal());
    };
    let outside = toplevel.is_some_and(|expected| expected != top.as_os_str());
    if rest.as_os_str().is_empty() || outside {
        return Err(traversal());
    }
    ensure_no_symlink_ancestor(archive, dest, &rest)?;

    let source = dest.join(&rest);
    let meta = fs::symlink_metadata(&source).map_err(|_| StagingError::ArchiveFormat {
        archive: archive.to_path_buf(),
        reason: format!("hard link target {} precedes its file", link.display()),
    })?;
    if !meta.file_type().is_file() {
        return Err(traversal());
    }
    Ok(source)
}

// A symlink unpacked earlier must not redirect later members outside `dest`.
fn ensure_no_symlink_ancestor(archive: &Path, dest: &Path, rel: &Path) -> Result<(), StagingError> {
    let mut current = dest.to_path_buf();
    let mut components = rel.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if let Ok(meta) = fs::symlink_metadata(&current) {
            if meta.file_type().is_symlink() {
                return Err(StagingError::PathTraversal {
                    archive: archive.to_path_buf(),
                    entry: rel.display().to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("pkg/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let result = validate_entry_path(Path::new("a.tar.gz"), Path::new(bad_path));
        assert!(
            matches!(result, Err(StagingError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_entry_path(Path::new("a.tar.gz"), Path::new("pkg-1.0/src/main.c")).is_ok());
    }

    #[test]
    fn split_ignores_curdir_prefix() {
        let (top, rest) = split_toplevel(Path::new("./pkg-1.0/src/lib.rs")).expect("split");
        assert_eq!(top, "pkg-1.0");
        assert_eq!(rest, PathBuf::from("src/lib.rs"));
        assert!(split_toplevel(Path::new("./")).is_none());
    }

    #[rstest]
    #[case("foo_1.0.orig.tar.xz", Some(CompressionKind::Xz))]
    #[case("foo_1.0.orig.tar.bz2", Some(CompressionKind::Bzip2))]
    #[case("foo_1.0.orig.tar.gz", Some(CompressionKind::Gzip))]
    #[case("foo_1.0.orig.tar.zst", None)]
    #[case("foo.xz", None)]
    fn kind_from_file_name(#[case] name: &str, #[case] expected: Option<CompressionKind>) {
        assert_eq!(CompressionKind::from_file_name(name), expected);
    }

    #[test]
    fn locate_prefers_xz_over_gz() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        fs::write(dir.path().join("foo.tar.gz"), b"gz").expect("gz");
        fs::write(dir.path().join("foo.tar.xz"), b"xz").expect("xz");
        let (path, kind) = locate_artifact(dir.path()).expect("locate");
        assert_eq!(kind, CompressionKind::Xz);
        assert!(path.ends_with("foo.tar.xz"));
    }

    #[test]
    fn locate_without_artifact_fails() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        fs::write(dir.path().join("foo.dsc"), b"x").expect("dsc");
        assert!(matches!(
            locate_artifact(dir.path()),
            Err(StagingError::ArtifactNotFound { .. })
        ));
    }
}
