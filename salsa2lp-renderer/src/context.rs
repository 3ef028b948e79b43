//! Template contexts — serializable rendering payloads.

use serde::{Deserialize, Serialize};

use salsa2lp_core::types::{PackageName, VersionInfo};

use crate::error::RenderError;

/// Payload for the build recipe template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeContext {
    /// Owner of the destination repository.
    pub team: String,
    pub package: String,
    /// Raw changelog version; the build service appends `~{revtime}`.
    pub version: String,
    /// Destination branch the recipe builds.
    pub branch: String,
}

impl RecipeContext {
    pub fn new(team: &str, package: &PackageName, version: &VersionInfo, branch: &str) -> Self {
        Self {
            team: team.to_string(),
            package: package.to_string(),
            version: version.version.clone(),
            branch: branch.to_string(),
        }
    }
}

/// Payload for the destination commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitContext {
    /// Host the packaging source was taken from.
    pub source_host: String,
    pub package: String,
    /// `pre-release` or `release`.
    pub channel: String,
    pub version: String,
    /// Head commit of the packaging source checkout.
    pub upstream_commit: String,
}

impl CommitContext {
    pub fn new(
        source_host: &str,
        package: &PackageName,
        version: &VersionInfo,
        upstream_commit: &str,
    ) -> Self {
        Self {
            source_host: source_host.to_string(),
            package: package.to_string(),
            channel: version.channel.to_string(),
            version: version.version.clone(),
            upstream_commit: upstream_commit.to_string(),
        }
    }
}

/// Convert any serializable context to a [`tera::Context`].
pub(crate) fn to_tera_context<T: Serialize>(ctx: &T) -> Result<tera::Context, RenderError> {
    let value = serde_json::to_value(ctx)?;
    Ok(tera::Context::from_value(value)?)
}
