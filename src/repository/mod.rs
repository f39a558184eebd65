//! Content repository - posts and lead records behind one async trait
//!
//! Two backends exist: [`MemoryRepository`] keeps everything in process
//! (seeded from markdown files) and [`RestRepository`] talks to a hosted
//! PostgREST endpoint. Row-level access rules live in the backend; admin
//! calls go through a repository bound to the signed-in session's token.

mod memory;
mod rest;

pub use memory::MemoryRepository;
pub use rest::{RestRepository, Tables};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::content::{LeadDraft, LeadRecord, Post, PostDraft};

/// Repository failure
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid row: {0}")]
    Decode(String),
}

/// CRUD over posts and lead records
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Published posts, newest first
    async fn published_posts(&self) -> Result<Vec<Post>, RepositoryError>;

    /// Every post including drafts, newest first
    async fn all_posts(&self) -> Result<Vec<Post>, RepositoryError>;

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepositoryError>;

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, RepositoryError>;

    async fn update_post(&self, id: &str, draft: &PostDraft) -> Result<Post, RepositoryError>;

    async fn delete_post(&self, id: &str) -> Result<(), RepositoryError>;

    /// Lead records, newest first
    async fn leads(&self) -> Result<Vec<LeadRecord>, RepositoryError>;

    async fn create_lead(&self, draft: &LeadDraft) -> Result<LeadRecord, RepositoryError>;

    async fn update_lead(&self, id: &str, draft: &LeadDraft)
        -> Result<LeadRecord, RepositoryError>;

    async fn delete_lead(&self, id: &str) -> Result<(), RepositoryError>;

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError>;

    /// A handle whose calls carry the given session token
    fn authorized(&self, access_token: &str) -> Arc<dyn ContentRepository>;
}
