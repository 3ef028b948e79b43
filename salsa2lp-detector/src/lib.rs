//! Packaging format classification for `salsa2lp-detector`.
//!
//! `classify(tree, runner)` inspects a packaging source checkout and returns
//! its [`PackagingFormat`] together with the version and distribution channel
//! of the newest changelog entry. Checks run cheapest first: required files,
//! then the changelog header, then the format query through `dpkg-source`.

use std::fs;
use std::path::{Path, PathBuf};

use salsa2lp_core::tool::{Invocation, ToolRunner};
use salsa2lp_core::types::{DistributionChannel, PackagingFormat, VersionInfo};
use salsa2lp_core::ToolError;
use thiserror::Error;

/// Files every packaging source must carry, relative to its root.
pub const REQUIRED_FILES: [&str; 3] = ["debian/rules", "debian/changelog", "debian/control"];

/// Format string declaring a self-contained (native) package.
pub const NATIVE_FORMAT: &str = "3.0 (native)";

/// Format strings that reference a separate upstream artifact.
pub const ARTIFACT_FORMATS: [&str; 6] = [
    "1.0",
    "2.0",
    "3.0 (quilt)",
    "3.0 (git)",
    "3.0 (bzr)",
    "3.0 (custom)",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of classifying a packaging source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub format: PackagingFormat,
    pub version: VersionInfo,
    /// Source package name from the changelog header.
    pub source_name: String,
}

/// First line of a Debian changelog, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogHeader {
    pub source_name: String,
    pub version: String,
    /// First distribution token (entries may list several).
    pub distribution: String,
}

/// Errors from classification. All of them skip the package.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("missing required packaging files: {}", .files.join(", "))]
    MissingMetadata { files: Vec<String> },

    #[error("cannot parse changelog entry in {path}: {message}")]
    MetadataParse { path: PathBuf, message: String },

    #[error("format query failed: {diagnostic}")]
    FormatQuery { diagnostic: String },

    #[error("unrecognized source format {format:?}")]
    UnrecognizedFormat { format: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify the packaging source tree at `tree`.
pub fn classify(tree: &Path, runner: &dyn ToolRunner) -> Result<Classification, ClassifyError> {
    check_required(tree)?;
    let header = read_changelog_header(tree)?;
    let format = query_format(tree, runner)?;
    let channel = DistributionChannel::from_distribution(&header.distribution);
    tracing::debug!(
        "{}: format {format}, version {} ({channel})",
        header.source_name,
        header.version
    );
    Ok(Classification {
        format,
        version: VersionInfo::new(header.version, channel),
        source_name: header.source_name,
    })
}

/// Fail with `MissingMetadata` listing every absent required file.
pub fn check_required(tree: &Path) -> Result<(), ClassifyError> {
    let missing: Vec<String> = REQUIRED_FILES
        .iter()
        .filter(|rel| !tree.join(rel).is_file())
        .map(|rel| rel.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClassifyError::MissingMetadata { files: missing })
    }
}

/// Read and parse the first line of `debian/changelog`.
pub fn read_changelog_header(tree: &Path) -> Result<ChangelogHeader, ClassifyError> {
    let path = tree.join("debian").join("changelog");
    let content = fs::read_to_string(&path).map_err(|source| ClassifyError::Io {
        path: path.clone(),
        source,
    })?;
    let first = content.lines().next().unwrap_or("");
    parse_changelog_header(first).map_err(|message| ClassifyError::MetadataParse { path, message })
}

/// Parse `<name> (<version>) <distribution...>;` at the start of `line`.
pub fn parse_changelog_header(line: &str) -> Result<ChangelogHeader, String> {
    let (name, rest) = line
        .split_once(" (")
        .ok_or_else(|| format!("expected `<name> (<version>)`, got {line:?}"))?;
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(format!("invalid source name {name:?}"));
    }
    let (version, rest) = rest
        .split_once(')')
        .ok_or_else(|| "unterminated version".to_string())?;
    let version = version.trim();
    if version.is_empty() || version.chars().any(char::is_whitespace) {
        return Err(format!("invalid version {version:?}"));
    }
    let (dists, _) = rest
        .split_once(';')
        .ok_or_else(|| "missing `;` after distribution".to_string())?;
    let distribution = dists
        .split_whitespace()
        .next()
        .ok_or_else(|| "missing distribution".to_string())?;
    Ok(ChangelogHeader {
        source_name: name.to_string(),
        version: version.to_string(),
        distribution: distribution.to_string(),
    })
}

/// Ask `dpkg-source` for the tree's source format and map it.
pub fn query_format(tree: &Path, runner: &dyn ToolRunner) -> Result<PackagingFormat, ClassifyError> {
    let invocation = Invocation::new("dpkg-source")
        .args(["--print-format", "."])
        .cwd(tree);
    let output = runner.run(&invocation)?;
    if !output.success() {
        return Err(ClassifyError::FormatQuery {
            diagnostic: output.diagnostic(),
        });
    }
    map_format(output.stdout.trim())
}

/// Map a source format string to a [`PackagingFormat`].
pub fn map_format(format: &str) -> Result<PackagingFormat, ClassifyError> {
    if format == NATIVE_FORMAT {
        Ok(PackagingFormat::SelfContained)
    } else if ARTIFACT_FORMATS.contains(&format) {
        Ok(PackagingFormat::ArtifactReferencing)
    } else {
        Err(ClassifyError::UnrecognizedFormat {
            format: format.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
