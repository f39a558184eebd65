//! Render a markdown file the way post bodies are rendered

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::content::{FrontMatter, MarkdownRenderer};

/// Render `path` to HTML. A front-matter block, if any, is skipped.
///
/// `sanitize = false` shows the fragment before the sanitizer pass.
pub fn render_file(path: &Path, sanitize: bool) -> Result<String> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

    let (_, body) = FrontMatter::parse(&source)?;
    let renderer = MarkdownRenderer::new();
    if sanitize {
        Ok(renderer.render(body))
    } else {
        Ok(renderer.render_unsanitized(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_file_skips_front_matter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        fs::write(&path, "---\ntitle: Hola\n---\n## Hola\n\n**mundo**").unwrap();

        let html = render_file(&path, true).unwrap();
        assert!(html.starts_with("<h2>Hola</h2>"));
        assert!(html.contains("<strong>mundo</strong>"));
        assert!(!html.contains("title:"));
    }

    #[test]
    fn test_render_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(render_file(&tmp.path().join("nada.md"), true).is_err());
    }
}
