//! Tera rendering engine — [`TemplateKind`] and [`Renderer`].
//!
//! | Template       | Used for                                        |
//! |----------------|-------------------------------------------------|
//! | recipe         | canonical build recipe text                     |
//! | commit message | provenance line of every destination commit     |

use tera::Tera;

use crate::context::{to_tera_context, CommitContext, RecipeContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates — baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("recipe.tera", include_str!("templates/recipe.tera")),
    ("commit_message.tera", include_str!("templates/commit_message.tera")),
];

/// Every template the renderer knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Recipe,
    CommitMessage,
}

impl TemplateKind {
    pub fn all() -> &'static [TemplateKind] {
        &[TemplateKind::Recipe, TemplateKind::CommitMessage]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::Recipe => "recipe.tera",
            TemplateKind::CommitMessage => "commit_message.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders recipe text and commit messages from embedded templates.
///
/// Output is trimmed, so rendering the same context twice always yields the
/// same bytes. Create once with [`Renderer::new`] and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TPLS.iter().copied())?;
        Ok(Renderer { tera })
    }

    /// Canonical recipe text for `ctx`.
    pub fn render_recipe(&self, ctx: &RecipeContext) -> Result<String, RenderError> {
        self.render(TemplateKind::Recipe, &to_tera_context(ctx)?)
    }

    /// One-line commit message for `ctx`.
    pub fn render_commit_message(&self, ctx: &CommitContext) -> Result<String, RenderError> {
        self.render(TemplateKind::CommitMessage, &to_tera_context(ctx)?)
    }

    fn render(&self, kind: TemplateKind, ctx: &tera::Context) -> Result<String, RenderError> {
        let out = self.tera.render(kind.template_name(), ctx)?;
        Ok(out.trim().to_string())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("templates", &TemplateKind::all())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("Renderer::new should succeed with embedded templates");
    }

    #[test]
    fn every_kind_is_registered() {
        let renderer = Renderer::new().expect("renderer");
        let names: Vec<&str> = renderer.tera.get_template_names().collect();
        for kind in TemplateKind::all() {
            assert!(names.contains(&kind.template_name()), "{kind:?} missing");
        }
    }
}
