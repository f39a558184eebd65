//! Content service - the in-memory view of published posts
//!
//! The service owns a snapshot of the published posts and answers every read
//! the public pages need from it. [`ContentService::reload`] fetches a fresh
//! set from the repository and swaps it in atomically; readers holding an
//! older snapshot keep it until they drop it.

use indexmap::IndexSet;
use std::sync::{Arc, PoisonError, RwLock};

use super::post::{Category, Post};
use crate::repository::ContentRepository;

/// Default number of posts returned by [`ContentService::recent`]
pub const DEFAULT_RECENT: usize = 3;

/// Cache of published posts with filtered read views
pub struct ContentService {
    repository: Arc<dyn ContentRepository>,
    posts: RwLock<Arc<Vec<Post>>>,
}

impl ContentService {
    /// Create an empty service over the given repository
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            repository,
            posts: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Create a service and populate it
    pub async fn load(repository: Arc<dyn ContentRepository>) -> Self {
        let service = Self::new(repository);
        service.reload().await;
        service
    }

    /// Refetch published posts and swap them in. Returns the new post count.
    ///
    /// A failed fetch leaves the service empty; the error is only logged.
    pub async fn reload(&self) -> usize {
        let posts = match self.repository.published_posts().await {
            Ok(posts) => posts,
            Err(e) => {
                tracing::error!("Failed to load posts: {}", e);
                Vec::new()
            }
        };

        let count = posts.len();
        *self.posts.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(posts);
        tracing::debug!("Content service holds {} posts", count);
        count
    }

    fn snapshot(&self) -> Arc<Vec<Post>> {
        self.posts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn filtered<F>(&self, predicate: F) -> Vec<Post>
    where
        F: Fn(&Post) -> bool,
    {
        self.snapshot()
            .iter()
            .filter(|p| predicate(p))
            .cloned()
            .collect()
    }

    /// All posts in repository order
    pub fn all(&self) -> Vec<Post> {
        self.snapshot().as_ref().clone()
    }

    pub fn featured(&self) -> Vec<Post> {
        self.filtered(|p| p.featured)
    }

    pub fn by_category(&self, category: Category) -> Vec<Post> {
        self.filtered(|p| p.category == category)
    }

    /// Posts carrying `tag`, compared case-insensitively
    pub fn by_tag(&self, tag: &str) -> Vec<Post> {
        self.filtered(|p| p.has_tag(tag))
    }

    pub fn by_slug(&self, slug: &str) -> Option<Post> {
        self.snapshot().iter().find(|p| p.slug == slug).cloned()
    }

    /// The `n` newest posts, newest first
    pub fn recent(&self, n: usize) -> Vec<Post> {
        let mut posts = self.all();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(n);
        posts
    }

    pub fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }

    /// Every tag in use, first occurrence wins
    pub fn tags(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let tags: IndexSet<&str> = snapshot
            .iter()
            .flat_map(|p| p.tags.iter().map(String::as_str))
            .collect();
        tags.into_iter().map(str::to_string).collect()
    }

    /// Up to `n` other posts in the same category
    pub fn related(&self, post: &Post, n: usize) -> Vec<Post> {
        self.snapshot()
            .iter()
            .filter(|p| p.category == post.category && p.slug != post.slug)
            .take(n)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
