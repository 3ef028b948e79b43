//! Build recipe synchronisation.
//!
//! The recipe text is a pure function of team, package and version, so
//! re-running with unchanged version metadata issues no write calls.

use salsa2lp_core::config::SyncConfig;
use salsa2lp_core::types::{PackageName, VersionInfo};
use salsa2lp_renderer::{RecipeContext, Renderer};

use crate::error::SyncError;
use crate::hosting::{HostingApi, NewRecipe};

/// What the synchroniser did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeOutcome {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for RecipeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipeOutcome::Created => write!(f, "created"),
            RecipeOutcome::Updated => write!(f, "updated"),
            RecipeOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

pub struct RecipeSynchronizer<'a> {
    config: &'a SyncConfig,
    hosting: &'a dyn HostingApi,
    renderer: &'a Renderer,
}

impl<'a> RecipeSynchronizer<'a> {
    pub fn new(config: &'a SyncConfig, hosting: &'a dyn HostingApi, renderer: &'a Renderer) -> Self {
        Self {
            config,
            hosting,
            renderer,
        }
    }

    /// Canonical recipe text for `package` at `version`.
    pub fn canonical_text(
        &self,
        team: &str,
        package: &PackageName,
        version: &VersionInfo,
    ) -> Result<String, SyncError> {
        let ctx = RecipeContext::new(team, package, version, &self.config.default_branch);
        Ok(self.renderer.render_recipe(&ctx)?)
    }

    /// Create the recipe, update its text on mismatch, or leave it alone.
    pub fn sync(
        &self,
        team: &str,
        package: &PackageName,
        version: &VersionInfo,
    ) -> Result<RecipeOutcome, SyncError> {
        let text = self.canonical_text(team, package, version)?;
        match self.hosting.find_recipe(team, package)? {
            None => {
                tracing::info!("{package}: creating the build recipe");
                self.hosting.create_recipe(&NewRecipe {
                    name: package.to_string(),
                    owner: team.to_string(),
                    text,
                    description: format!("Daily build of {package}"),
                    archive: self.config.ppa_name.clone(),
                    distribution: self.config.distribution.clone(),
                    series: self.config.target_series.clone(),
                    build_daily: true,
                })?;
                Ok(RecipeOutcome::Created)
            }
            Some(existing) if existing.text.trim() == text => Ok(RecipeOutcome::Unchanged),
            Some(existing) => {
                tracing::info!("{package}: updating the build recipe");
                self.hosting.update_recipe_text(&existing, &text)?;
                Ok(RecipeOutcome::Updated)
            }
        }
    }
}
