//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine (no HTML escaping)
    hbs: Handlebars<'static>,
    /// Directories searched in order before the embedded fallback
    search_dirs: Vec<PathBuf>,
}

impl PromptLoader {
    /// Create a loader rooted at `worktree`
    ///
    /// Lookup order: `override_dir`, `<worktree>/.dump2plan/prompts/`,
    /// `<worktree>/prompts/`, then the embedded templates. Directories that do
    /// not exist are skipped.
    pub fn new(worktree: impl AsRef<Path>, override_dir: Option<PathBuf>) -> Self {
        let worktree = worktree.as_ref();
        debug!(?worktree, ?override_dir, "PromptLoader::new: called");

        let candidates = override_dir
            .into_iter()
            .chain([worktree.join(".dump2plan/prompts"), worktree.join("prompts")]);
        let search_dirs: Vec<PathBuf> = candidates.filter(|d| d.is_dir()).collect();
        debug!(?search_dirs, "PromptLoader::new: search directories");

        Self {
            hbs: Self::engine(),
            search_dirs,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            search_dirs: vec![],
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name, first match wins
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in &self.search_dirs {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: using embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Check that every known template loads and parses
    pub fn check_all(&self) -> Result<()> {
        for name in embedded::NAMES {
            let template = self.load_template(name)?;
            handlebars::Template::compile(&template).map_err(|e| eyre!("Template {} is invalid: {}", name, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_embedded_gather_context() {
        let loader = PromptLoader::embedded_only();
        let text = loader
            .render(
                "gather-context",
                &json!({"questions": ["Which platforms?", "Any deadline?"]}),
            )
            .unwrap();
        assert!(text.starts_with("Before I create your plan, I have a few questions:\n"));
        assert!(text.contains("- Which platforms?"));
        assert!(text.contains("- Any deadline?"));
    }

    #[test]
    fn test_render_does_not_html_escape() {
        let loader = PromptLoader::embedded_only();
        let text = loader
            .render("analyze", &json!({"input": "use <b>bold</b> & \"quotes\""}))
            .unwrap();
        assert!(text.contains("use <b>bold</b> & \"quotes\""));
    }

    #[test]
    fn test_unknown_template_fails() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.render("nonexistent-template", &json!({})).is_err());
    }

    #[test]
    fn test_lookup_chain_prefers_override_then_local() {
        let root = tempfile::tempdir().unwrap();
        let local = root.path().join(".dump2plan/prompts");
        let repo = root.path().join("prompts");
        let overrides = root.path().join("custom");
        for dir in [&local, &repo, &overrides] {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(local.join("analyze.pmt"), "local {{input}}").unwrap();
        std::fs::write(repo.join("analyze.pmt"), "repo {{input}}").unwrap();
        std::fs::write(repo.join("chat.pmt"), "repo chat").unwrap();
        std::fs::write(overrides.join("chat.pmt"), "override chat").unwrap();

        let loader = PromptLoader::new(root.path(), Some(overrides));
        assert_eq!(loader.render("analyze", &json!({"input": "x"})).unwrap(), "local x");
        assert_eq!(loader.render("chat", &json!({})).unwrap(), "override chat");
        assert!(loader.render("finalize", &json!({})).unwrap().contains("Finalize this project plan"));
    }

    #[test]
    fn test_missing_directories_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let loader = PromptLoader::new(root.path(), Some(root.path().join("nope")));
        assert!(loader.search_dirs.is_empty());
        assert!(loader.check_all().is_ok());
    }

    #[test]
    fn test_check_all_reports_broken_override() {
        let root = tempfile::tempdir().unwrap();
        let repo = root.path().join("prompts");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("structure.pmt"), "{{#each ideas.actions}}unclosed").unwrap();

        let loader = PromptLoader::new(root.path(), None);
        assert!(loader.check_all().is_err());
    }
}
