//! crianzas: site and admin panel for a conscious-parenting practice
//!
//! Serves the public pages and blog from a post repository (a PostgREST
//! backend or an in-memory store seeded from markdown files), records guide
//! leads, sends contact and guide emails through SendGrid, and offers a
//! session-guarded admin panel for posts and leads.

pub mod analytics;
pub mod auth;
pub mod commands;
pub mod config;
pub mod content;
pub mod helpers;
pub mod notify;
pub mod repository;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use auth::{AuthProvider, StaticAuth, SupabaseAuth};
use content::loader::PostLoader;
use content::Post;
use notify::{Notifier, SendGridMailer};
use repository::{ContentRepository, MemoryRepository, RestRepository};

/// A site rooted at a directory holding `_config.yml`
#[derive(Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Seed content directory
    pub content_dir: PathBuf,
    /// Static assets served under `/static`
    pub static_dir: PathBuf,
}

impl Site {
    /// Load the site in `base_dir`; a missing config file means defaults
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::debug!("No _config.yml in {:?}, using defaults", base_dir);
            config::SiteConfig::default()
        };
        config.apply_env();

        let content_dir = base_dir.join(&config.content_dir);
        let static_dir = base_dir.join("static");

        Ok(Self {
            config,
            base_dir,
            content_dir,
            static_dir,
        })
    }

    /// Posts from the markdown seed directory
    pub fn seed_posts(&self) -> Result<Vec<Post>> {
        PostLoader::new(&self.content_dir, &self.config.author).load_posts()
    }

    /// The hosted backend when configured, otherwise an in-memory store
    pub fn repository(&self, client: reqwest::Client) -> Result<Arc<dyn ContentRepository>> {
        if self.config.uses_backend() {
            tracing::info!("Using backend at {}", self.config.supabase.url);
            return Ok(Arc::new(RestRepository::new(
                client,
                &self.config.supabase.url,
                &self.config.supabase.anon_key,
                self.config.tables(),
            )));
        }

        let posts = self.seed_posts()?;
        tracing::info!("Using in-memory store with {} seed posts", posts.len());
        Ok(Arc::new(MemoryRepository::with_posts(posts)))
    }

    pub fn auth(&self, client: reqwest::Client) -> Arc<dyn AuthProvider> {
        if self.config.uses_backend() {
            Arc::new(SupabaseAuth::new(
                client,
                &self.config.supabase.url,
                &self.config.supabase.anon_key,
            ))
        } else {
            if self.config.admin.email.is_empty() {
                tracing::warn!("No admin credentials configured; admin sign-in is disabled");
            }
            Arc::new(StaticAuth::new(
                &self.config.admin.email,
                &self.config.admin.password,
            ))
        }
    }

    pub fn notifier(&self, client: reqwest::Client) -> Notifier {
        let email = &self.config.email;
        let mailer = SendGridMailer::new(client.clone(), &email.api_url, &email.api_key);
        Notifier::new(
            Arc::new(mailer),
            client,
            email.clone(),
            self.config.guide.clone(),
            self.config.guide_pdf_url(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_defaults_without_config() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        assert_eq!(site.content_dir, tmp.path().join("content"));
        assert_eq!(site.static_dir, tmp.path().join("static"));
        assert!(site.seed_posts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_site_memory_repository_uses_seed_posts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("_config.yml"), "content_dir: notas\n").unwrap();
        let posts = tmp.path().join("notas/posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("hola.md"),
            "---\ntitle: Hola\nexcerpt: Saludo\ndate: 2025-01-01\n---\nTexto",
        )
        .unwrap();

        let mut site = Site::new(tmp.path()).unwrap();
        site.config.supabase.url.clear();
        let repo = site.repository(reqwest::Client::new()).unwrap();
        let published = repo.published_posts().await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].slug, "hola");
    }
}
