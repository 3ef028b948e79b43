//! Parallel batches over the in-memory fakes.

use std::sync::Arc;

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_core::types::PackageRef;
use salsa2lp_runtime::{run, RunOptions};
use salsa2lp_sync::testing::Harness;
use salsa2lp_sync::ErrorKind;
use tempfile::TempDir;

fn pkg(name: &str) -> PackageRef {
    PackageRef::new(name, "ubports-team")
}

fn options(jobs: usize) -> RunOptions {
    RunOptions {
        jobs,
        handle_interrupt: false,
    }
}

fn harness_with(home: &TempDir, names: &[&str]) -> Harness {
    let h = Harness::new(home.path());
    for name in names {
        h.add_quilt_package(name, "1.0-1", &[("README", b"upstream readme\n")]);
    }
    h
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_batch_reports_in_input_order() {
    let home = TempDir::new().expect("home");
    let names = ["alpha", "bravo", "charlie", "delta"];
    let h = harness_with(&home, &names);
    let packages: Vec<PackageRef> = names.iter().map(|n| pkg(n)).collect();

    let report = run(Arc::new(h.engine()), packages, options(3), CancelFlag::new())
        .await
        .expect("run");

    let order: Vec<&str> = report.reports.iter().map(|r| r.package.name.as_str()).collect();
    assert_eq!(order, names);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.exit_code(), 0);
    assert!(report.not_started.is_empty());
    assert_eq!(h.vcs.pushes(), 4);
    for name in names {
        assert!(h.hosting.has_repository(&format!("~lomiri/+git/{name}")));
        assert!(!h.config.staging_root.join(name).exists());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn skipped_package_does_not_stop_workers() {
    let home = TempDir::new().expect("home");
    let h = harness_with(&home, &["alpha", "charlie"]);
    let packages = vec![pkg("alpha"), pkg("missing"), pkg("charlie")];

    let report = run(Arc::new(h.engine()), packages, options(2), CancelFlag::new())
        .await
        .expect("run");

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped(), 1);
    let missing = report.reports[1].result.as_ref().unwrap_err();
    assert_eq!(missing.kind, ErrorKind::Skipped);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn cancelled_batch_starts_nothing() {
    let home = TempDir::new().expect("home");
    let h = harness_with(&home, &["alpha", "bravo"]);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = run(
        Arc::new(h.engine()),
        vec![pkg("alpha"), pkg("bravo")],
        options(2),
        cancel,
    )
    .await
    .expect("run");

    assert!(report.interrupted);
    assert!(report.reports.is_empty());
    assert_eq!(report.not_started.len(), 2);
    assert_eq!(report.exit_code(), 130);
    assert_eq!(h.source.checkouts(), 0);
}

#[tokio::test]
async fn zero_jobs_still_runs() {
    let home = TempDir::new().expect("home");
    let h = harness_with(&home, &["alpha"]);
    let report = run(Arc::new(h.engine()), vec![pkg("alpha")], options(0), CancelFlag::new())
        .await
        .expect("run");
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn empty_batch_is_clean() {
    let home = TempDir::new().expect("home");
    let h = Harness::new(home.path());
    let report = run(Arc::new(h.engine()), Vec::new(), options(4), CancelFlag::new())
        .await
        .expect("run");
    assert!(report.reports.is_empty());
    assert_eq!(report.exit_code(), 0);
}
