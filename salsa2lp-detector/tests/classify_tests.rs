//! Parameterised classification tests for `salsa2lp-detector`.
//!
//! Each `#[case]` gets an isolated `TempDir`; `dpkg-source` is replaced by a
//! scripted runner so the tests need no Debian tooling.

use std::fs;
use std::sync::Mutex;

use rstest::rstest;
use salsa2lp_core::tool::{Invocation, ToolOutput, ToolRunner};
use salsa2lp_core::types::{DistributionChannel, PackagingFormat};
use salsa2lp_core::ToolError;
use salsa2lp_detector::{classify, ClassifyError};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Answers every invocation with a fixed output and records the calls.
struct ScriptedRunner {
    output: ToolOutput,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    fn new(output: ToolOutput) -> Self {
        Self {
            output,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().expect("lock").push(invocation.clone());
        Ok(self.output.clone())
    }
}

fn packaging_tree(changelog: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let debian = dir.path().join("debian");
    fs::create_dir_all(&debian).expect("mkdir debian");
    fs::write(debian.join("rules"), "#!/usr/bin/make -f\n").expect("rules");
    fs::write(debian.join("control"), "Source: mypkg\n").expect("control");
    fs::write(debian.join("changelog"), changelog).expect("changelog");
    dir
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[rstest]
#[case("3.0 (quilt)\n", PackagingFormat::ArtifactReferencing)]
#[case("3.0 (native)\n", PackagingFormat::SelfContained)]
#[case("1.0\n", PackagingFormat::ArtifactReferencing)]
fn format_from_tool_output(#[case] stdout: &str, #[case] expected: PackagingFormat) {
    let tree = packaging_tree("mypkg (1.2.3-1) unstable; urgency=medium\n\n  * Entry.\n");
    let runner = ScriptedRunner::new(ToolOutput::ok(stdout));
    let c = classify(tree.path(), &runner).expect("classify");
    assert_eq!(c.format, expected);
    assert_eq!(runner.calls(), 1);
}

#[test]
fn quilt_release_scenario() {
    let tree = packaging_tree("mypkg (1.2.3-1) unstable;\n");
    let runner = ScriptedRunner::new(ToolOutput::ok("3.0 (quilt)\n"));
    let c = classify(tree.path(), &runner).expect("classify");
    assert_eq!(c.format, PackagingFormat::ArtifactReferencing);
    assert_eq!(c.version.version, "1.2.3-1");
    assert_eq!(c.version.channel, DistributionChannel::Release);
    assert_eq!(c.source_name, "mypkg");
}

#[test]
fn unreleased_is_pre_release() {
    let tree = packaging_tree("mypkg (2.0.0-1) UNRELEASED; urgency=low\n");
    let runner = ScriptedRunner::new(ToolOutput::ok("3.0 (native)\n"));
    let c = classify(tree.path(), &runner).expect("classify");
    assert_eq!(c.version.channel, DistributionChannel::PreRelease);
}

#[rstest]
#[case("debian/rules")]
#[case("debian/changelog")]
#[case("debian/control")]
fn missing_required_file_is_reported(#[case] missing: &str) {
    let tree = packaging_tree("mypkg (1.0-1) unstable;\n");
    fs::remove_file(tree.path().join(missing)).expect("remove");
    let runner = ScriptedRunner::new(ToolOutput::ok("3.0 (quilt)\n"));

    let err = classify(tree.path(), &runner).unwrap_err();
    match err {
        ClassifyError::MissingMetadata { files } => assert_eq!(files, vec![missing.to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.calls(), 0, "no tool runs when files are missing");
}

#[test]
fn garbage_changelog_is_parse_error() {
    let tree = packaging_tree("this is not a changelog\n");
    let runner = ScriptedRunner::new(ToolOutput::ok("3.0 (quilt)\n"));
    let err = classify(tree.path(), &runner).unwrap_err();
    assert!(matches!(err, ClassifyError::MetadataParse { .. }), "got: {err}");
    assert!(err.to_string().contains("changelog"));
}

#[test]
fn nonzero_tool_status_is_format_query_error() {
    let tree = packaging_tree("mypkg (1.0-1) unstable;\n");
    let runner = ScriptedRunner::new(ToolOutput::failed(255, "dpkg-source: error: bad format"));
    let err = classify(tree.path(), &runner).unwrap_err();
    assert!(matches!(err, ClassifyError::FormatQuery { .. }), "got: {err}");
    assert!(err.to_string().contains("bad format"));
}
