//! # salsa2lp-renderer
//!
//! Tera-based rendering of the two deterministic strings the engine
//! publishes: build recipe text and destination commit messages.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use salsa2lp_core::types::{DistributionChannel, PackageName, VersionInfo};
//! use salsa2lp_renderer::{RecipeContext, Renderer};
//!
//! fn recipe_for(pkg: &PackageName) -> Option<String> {
//!     let renderer = Renderer::new().ok()?;
//!     let version = VersionInfo::new("1.0-1", DistributionChannel::Release);
//!     renderer
//!         .render_recipe(&RecipeContext::new("lomiri", pkg, &version, "main"))
//!         .ok()
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{CommitContext, RecipeContext};
pub use engine::{Renderer, TemplateKind};
pub use error::RenderError;
