//! Workspace lifecycle on disk, including hostile archives.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use salsa2lp_core::types::PackageRef;
use salsa2lp_sync::testing::compress;
use salsa2lp_sync::{CompressionKind, StagingArea, StagingError};

fn pkg(name: &str) -> PackageRef {
    PackageRef::new(name, "ubports-team")
}

/// Tarball whose single member is named `name` verbatim, bypassing the
/// builder's own path checks.
fn raw_member_archive(name: &str) -> Vec<u8> {
    let mut header = tar::Header::new_old();
    {
        let raw = header.as_old_mut();
        raw.name[..name.len()].copy_from_slice(name.as_bytes());
    }
    header.set_size(4);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, &b"evil"[..]).expect("append");
    compress(CompressionKind::Gzip, &builder.into_inner().expect("finish"))
}

#[test]
fn traversal_member_is_rejected_and_nothing_escapes() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let area = StagingArea::new(root.path());
    let ws = area.acquire(&pkg("mypkg")).expect("acquire");

    let archive = ws.artifacts_dir().join("mypkg_1.0.orig.tar.gz");
    std::fs::write(&archive, raw_member_archive("mypkg-1.0/../../escaped")).expect("write");

    let err = ws
        .extract_artifact(&archive, CompressionKind::Gzip)
        .unwrap_err();
    assert!(matches!(err, StagingError::PathTraversal { .. }), "got: {err}");
    root.child("escaped").assert(predicate::path::missing());
    root.child("mypkg/escaped").assert(predicate::path::missing());
    ws.release().expect("release");
}

#[test]
fn workspace_layout_lives_under_package_name() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let area = StagingArea::new(root.path());
    let ws = area.acquire(&pkg("lomiri-ui-toolkit")).expect("acquire");

    for sub in ["source", "artifacts", "upstream", "dest"] {
        root.child("lomiri-ui-toolkit")
            .child(sub)
            .assert(predicate::path::is_dir());
    }
    assert_eq!(area.active(), 1);
    ws.release().expect("release");
    root.child("lomiri-ui-toolkit")
        .assert(predicate::path::missing());
    assert_eq!(area.active(), 0);
}

#[test]
fn unusable_names_are_refused() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let area = StagingArea::new(root.path());
    for name in ["", "..", "a/b", "with space"] {
        let err = area.acquire(&pkg(name)).unwrap_err();
        assert!(matches!(err, StagingError::InvalidName { .. }), "{name:?}: {err}");
    }
    assert_eq!(area.active(), 0);
}
