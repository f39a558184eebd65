//! Seed loader - reads posts from a directory of markdown files
//!
//! Used by the in-memory repository so the site can run without a hosted
//! backend, and by `crianzas list` for offline inspection.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::post::{parse_timestamp, Category, Post};
use super::{estimate_reading_time, FrontMatter};

/// Loads seed posts from `<content_dir>/posts`
pub struct PostLoader {
    posts_dir: PathBuf,
    default_author: String,
}

impl PostLoader {
    /// Create a loader for the given content directory
    pub fn new<P: AsRef<Path>>(content_dir: P, default_author: &str) -> Self {
        Self {
            posts_dir: content_dir.as_ref().join("posts"),
            default_author: default_author.to_string(),
        }
    }

    /// Load every post, newest first. Broken files are skipped with a warning.
    pub fn load_posts(&self) -> Result<Vec<Post>> {
        if !self.posts_dir.exists() {
            tracing::debug!("No seed posts directory at {:?}", self.posts_dir);
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();

        for entry in WalkDir::new(&self.posts_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && is_markdown_file(path) {
                match self.load_post(path) {
                    Ok(post) => posts.push(post),
                    Err(e) => {
                        tracing::warn!("Failed to load post {:?}: {}", path, e);
                    }
                }
            }
        }

        // stable: equal dates keep directory order
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        Ok(posts)
    }

    /// Load a single post from a file
    fn load_post(&self, path: &Path) -> Result<Post> {
        let content = fs::read_to_string(path)?;
        let (fm, body) = FrontMatter::parse(&content)?;

        let file_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        let category = match fm.category.as_deref() {
            Some(label) => label.parse::<Category>()?,
            None => Category::default(),
        };

        let published_at = match fm.date.as_deref() {
            Some(date) => parse_timestamp(date).ok_or_else(|| anyhow!("invalid date: {}", date))?,
            None => fs::metadata(path)?
                .modified()
                .map(chrono::DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now()),
        };

        let slug = fm.slug.unwrap_or_else(|| file_stem.clone());
        let body = body.trim().to_string();

        Ok(Post {
            id: slug.clone(),
            title: fm.title.unwrap_or(file_stem),
            slug,
            excerpt: fm.excerpt.unwrap_or_default(),
            reading_time: fm.reading_time.unwrap_or_else(|| estimate_reading_time(&body)),
            body,
            author: fm.author.unwrap_or_else(|| self.default_author.clone()),
            published_at,
            updated_at: fm.updated.as_deref().and_then(parse_timestamp),
            image_url: fm.image.unwrap_or_default(),
            category,
            tags: fm.tags,
            featured: fm.featured,
            is_published: fm.published,
        })
    }
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}
