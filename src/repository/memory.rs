//! In-process repository backed by a mutex-guarded store

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ContentRepository, RepositoryError};
use crate::content::{LeadDraft, LeadRecord, Post, PostDraft};

#[derive(Debug, Default)]
struct Store {
    posts: Vec<Post>,
    leads: Vec<LeadRecord>,
}

/// Fresh row id; seeded posts keep their slug as id
fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Repository that keeps posts and leads in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding the given posts
    pub fn with_posts(posts: Vec<Post>) -> Self {
        let repo = Self::new();
        repo.lock().posts = posts;
        repo
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    posts
}

#[async_trait]
impl ContentRepository for MemoryRepository {
    async fn published_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        let posts = self
            .lock()
            .posts
            .iter()
            .filter(|p| p.is_published)
            .cloned()
            .collect();
        Ok(newest_first(posts))
    }

    async fn all_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        Ok(newest_first(self.lock().posts.clone()))
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepositoryError> {
        Ok(self.lock().posts.iter().find(|p| p.slug == slug).cloned())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, RepositoryError> {
        let mut store = self.lock();
        let id = new_id();
        let post = draft.clone().into_post(id);
        store.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: &str, draft: &PostDraft) -> Result<Post, RepositoryError> {
        let mut store = self.lock();
        let slot = store
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("post {}", id)))?;
        *slot = draft.clone().into_post(id.to_string());
        Ok(slot.clone())
    }

    async fn delete_post(&self, id: &str) -> Result<(), RepositoryError> {
        let mut store = self.lock();
        let before = store.posts.len();
        store.posts.retain(|p| p.id != id);
        if store.posts.len() == before {
            return Err(RepositoryError::NotFound(format!("post {}", id)));
        }
        Ok(())
    }

    async fn leads(&self) -> Result<Vec<LeadRecord>, RepositoryError> {
        let mut leads = self.lock().leads.clone();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn create_lead(&self, draft: &LeadDraft) -> Result<LeadRecord, RepositoryError> {
        let mut store = self.lock();
        let lead = LeadRecord {
            id: new_id(),
            email: draft.email.clone(),
            created_at: Utc::now(),
            source_page: draft.source_page.clone(),
        };
        store.leads.push(lead.clone());
        Ok(lead)
    }

    async fn update_lead(
        &self,
        id: &str,
        draft: &LeadDraft,
    ) -> Result<LeadRecord, RepositoryError> {
        let mut store = self.lock();
        let lead = store
            .leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("lead {}", id)))?;
        lead.email = draft.email.clone();
        lead.source_page = draft.source_page.clone();
        Ok(lead.clone())
    }

    async fn delete_lead(&self, id: &str) -> Result<(), RepositoryError> {
        let mut store = self.lock();
        let before = store.leads.len();
        store.leads.retain(|l| l.id != id);
        if store.leads.len() == before {
            return Err(RepositoryError::NotFound(format!("lead {}", id)));
        }
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        Ok(self.lock().leads.iter().any(|l| l.email == email))
    }

    fn authorized(&self, _access_token: &str) -> Arc<dyn ContentRepository> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Category, LeadDraft};

    fn draft(slug: &str, days_ago: i64, published: bool) -> PostDraft {
        let mut d = PostDraft::new("Mailen");
        d.slug = slug.to_string();
        d.title = slug.to_string();
        d.excerpt = "x".to_string();
        d.body = "y".to_string();
        d.published_at = Utc::now() - chrono::Duration::days(days_ago);
        d.is_published = published;
        d
    }

    #[tokio::test]
    async fn test_post_crud() {
        let repo = MemoryRepository::new();
        let old = repo.create_post(&draft("viejo", 10, true)).await.unwrap();
        repo.create_post(&draft("nuevo", 1, true)).await.unwrap();
        repo.create_post(&draft("borrador", 0, false)).await.unwrap();

        let published = repo.published_posts().await.unwrap();
        assert_eq!(
            published.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>(),
            vec!["nuevo", "viejo"]
        );
        assert_eq!(repo.all_posts().await.unwrap().len(), 3);

        let mut edit = PostDraft::from(&old);
        edit.category = Category::Familia;
        let updated = repo.update_post(&old.id, &edit).await.unwrap();
        assert_eq!(updated.category, Category::Familia);
        assert_eq!(updated.id, old.id);

        repo.delete_post(&old.id).await.unwrap();
        assert!(repo.post_by_slug("viejo").await.unwrap().is_none());
        assert!(matches!(
            repo.delete_post(&old.id).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_created_ids_do_not_collide_with_seeds() {
        let mut seed = draft("1", 3, true).into_post("1".to_string());
        seed.slug = "1".to_string();
        let repo = MemoryRepository::with_posts(vec![seed]);

        let created = repo.create_post(&draft("nuevo", 0, true)).await.unwrap();
        assert_ne!(created.id, "1");
        repo.delete_post(&created.id).await.unwrap();
        assert!(repo.post_by_slug("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_lead_submissions_are_both_recorded() {
        let repo = MemoryRepository::new();
        let lead = LeadDraft::new("ana@example.com", "");
        repo.create_lead(&lead).await.unwrap();
        repo.create_lead(&lead).await.unwrap();

        assert_eq!(repo.leads().await.unwrap().len(), 2);
        assert!(repo.email_exists("ana@example.com").await.unwrap());
        assert!(!repo.email_exists("otra@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_lead_update_and_delete() {
        let repo = MemoryRepository::new();
        let lead = repo
            .create_lead(&LeadDraft::new("ana@example.com", ""))
            .await
            .unwrap();
        let updated = repo
            .update_lead(&lead.id, &LeadDraft::new("ana@correo.es", "blog"))
            .await
            .unwrap();
        assert_eq!(updated.email, "ana@correo.es");
        assert_eq!(updated.source_page, "blog");

        repo.delete_lead(&lead.id).await.unwrap();
        assert!(repo.leads().await.unwrap().is_empty());
    }
}
