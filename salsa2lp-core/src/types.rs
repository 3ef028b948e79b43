//! Domain types shared by every salsa2lp crate.
//!
//! Values here are created once per sync attempt and never mutated
//! afterwards; the engine passes them around by reference.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a source package (also the destination repository and recipe name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageName(pub String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Group (namespace) on the packaging host that owns a packaging repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceGroup(pub String);

impl SourceGroup {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SourceGroup {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SourceGroup {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Package identity
// ---------------------------------------------------------------------------

/// Identifies one package to synchronise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: PackageName,
    pub source_group: SourceGroup,
}

impl PackageRef {
    pub fn new(name: impl Into<PackageName>, source_group: impl Into<SourceGroup>) -> Self {
        Self {
            name: name.into(),
            source_group: source_group.into(),
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_group, self.name)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the packaging source relates to the upstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackagingFormat {
    /// The packaging repository already is the full buildable source.
    SelfContained,
    /// The packaging repository points at an upstream tarball that must be merged in.
    ArtifactReferencing,
}

impl PackagingFormat {
    pub fn needs_artifact(self) -> bool {
        matches!(self, PackagingFormat::ArtifactReferencing)
    }
}

impl fmt::Display for PackagingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackagingFormat::SelfContained => write!(f, "self-contained"),
            PackagingFormat::ArtifactReferencing => write!(f, "artifact-referencing"),
        }
    }
}

/// Distribution channel of the newest changelog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionChannel {
    PreRelease,
    Release,
}

impl DistributionChannel {
    /// Distribution token that marks an entry as not yet released.
    pub const UNRELEASED: &'static str = "UNRELEASED";

    /// Map a raw changelog distribution token to a channel.
    pub fn from_distribution(token: &str) -> Self {
        if token == Self::UNRELEASED {
            DistributionChannel::PreRelease
        } else {
            DistributionChannel::Release
        }
    }
}

impl fmt::Display for DistributionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionChannel::PreRelease => write!(f, "pre-release"),
            DistributionChannel::Release => write!(f, "release"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Version and channel taken from the first changelog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub channel: DistributionChannel,
}

impl VersionInfo {
    pub fn new(version: impl Into<String>, channel: DistributionChannel) -> Self {
        Self {
            version: version.into(),
            channel,
        }
    }
}

/// A named build recipe and its canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecipe {
    pub name: String,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
