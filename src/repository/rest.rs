//! PostgREST repository (Supabase `rest/v1`)

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::{ContentRepository, RepositoryError};
use crate::content::{LeadDraft, LeadRecord, Post, PostDraft};

/// Table names on the backend
#[derive(Debug, Clone)]
pub struct Tables {
    pub posts: String,
    pub leads: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            posts: "posts".to_string(),
            leads: "lead_records".to_string(),
        }
    }
}

/// Repository speaking the PostgREST dialect over HTTP
#[derive(Debug, Clone)]
pub struct RestRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    tables: Tables,
}

impl RestRepository {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, tables: Tables) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: None,
            tables,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
    }

    /// Send a read and decode rows, skipping rows that fail to decode
    async fn select<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, RepositoryError> {
        let Some(rows) = self.send(request).await? else {
            return Ok(Vec::new());
        };

        let mut decoded = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<T>(row) {
                Ok(item) => decoded.push(item),
                Err(e) => tracing::warn!("Skipping invalid row: {}", e),
            }
        }
        Ok(decoded)
    }

    /// Send a write that returns the affected row
    async fn write_one<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: String,
    ) -> Result<T, RepositoryError> {
        let rows = self
            .send(request.header("Prefer", "return=representation"))
            .await?
            .unwrap_or_default();
        let row = rows
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound(what))?;
        serde_json::from_value(row).map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    /// Send a request; `None` when the table is not provisioned yet
    async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<Vec<serde_json::Value>>, RepositoryError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(Some(Vec::new()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if is_not_provisioned(status, &message) {
                tracing::warn!("Backend resource not provisioned, treating as empty: {}", message);
                return Ok(None);
            }
            return Err(RepositoryError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        match serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
        {
            serde_json::Value::Array(rows) => Ok(Some(rows)),
            row => Ok(Some(vec![row])),
        }
    }

    async fn delete_by_id(&self, table: &str, id: &str, what: &str) -> Result<(), RepositoryError> {
        let request = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        match self.send(request).await? {
            Some(rows) if rows.is_empty() => {
                Err(RepositoryError::NotFound(format!("{} {}", what, id)))
            }
            _ => Ok(()),
        }
    }

    async fn patch_by_id<B, T>(
        &self,
        table: &str,
        id: &str,
        body: &B,
        what: &str,
    ) -> Result<T, RepositoryError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id))])
            .json(body);
        self.write_one(request, format!("{} {}", what, id)).await
    }
}

/// PostgREST reports a missing table as PGRST205 (schema cache) or 42P01
fn is_not_provisioned(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND || body.contains("PGRST205") || body.contains("42P01")
}

#[async_trait]
impl ContentRepository for RestRepository {
    async fn published_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        let request = self.request(Method::GET, &self.tables.posts).query(&[
            ("select", "*"),
            ("is_published", "eq.true"),
            ("order", "published_date.desc"),
        ]);
        self.select(request).await
    }

    async fn all_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        let request = self
            .request(Method::GET, &self.tables.posts)
            .query(&[("select", "*"), ("order", "published_date.desc")]);
        self.select(request).await
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepositoryError> {
        let request = self.request(Method::GET, &self.tables.posts).query(&[
            ("select", "*".to_string()),
            ("slug", format!("eq.{}", slug)),
            ("limit", "1".to_string()),
        ]);
        Ok(self.select(request).await?.into_iter().next())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, RepositoryError> {
        let request = self.request(Method::POST, &self.tables.posts).json(draft);
        self.write_one(request, format!("post {}", draft.slug)).await
    }

    async fn update_post(&self, id: &str, draft: &PostDraft) -> Result<Post, RepositoryError> {
        self.patch_by_id(&self.tables.posts, id, draft, "post").await
    }

    async fn delete_post(&self, id: &str) -> Result<(), RepositoryError> {
        self.delete_by_id(&self.tables.posts, id, "post").await
    }

    async fn leads(&self) -> Result<Vec<LeadRecord>, RepositoryError> {
        let request = self
            .request(Method::GET, &self.tables.leads)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.select(request).await
    }

    async fn create_lead(&self, draft: &LeadDraft) -> Result<LeadRecord, RepositoryError> {
        let request = self.request(Method::POST, &self.tables.leads).json(draft);
        self.write_one(request, format!("lead {}", draft.email)).await
    }

    async fn update_lead(
        &self,
        id: &str,
        draft: &LeadDraft,
    ) -> Result<LeadRecord, RepositoryError> {
        self.patch_by_id(&self.tables.leads, id, draft, "lead").await
    }

    async fn delete_lead(&self, id: &str) -> Result<(), RepositoryError> {
        self.delete_by_id(&self.tables.leads, id, "lead").await
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        let request = self.request(Method::GET, &self.tables.leads).query(&[
            ("select", "email".to_string()),
            ("email", format!("eq.{}", email)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<serde_json::Value> = self.select(request).await?;
        Ok(!rows.is_empty())
    }

    fn authorized(&self, access_token: &str) -> Arc<dyn ContentRepository> {
        let mut repo = self.clone();
        repo.access_token = Some(access_token.to_string());
        Arc::new(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo(server: &MockServer) -> RestRepository {
        RestRepository::new(
            reqwest::Client::new(),
            &server.uri(),
            "anon-key",
            Tables::default(),
        )
    }

    fn row(slug: &str, category: &str) -> serde_json::Value {
        json!({
            "id": 1,
            "slug": slug,
            "title": "Título",
            "excerpt": "Resumen",
            "content": "# Hola",
            "author": "Mailen",
            "published_date": "2025-01-15T00:00:00+00:00",
            "image_url": "",
            "category": category,
            "tags": ["límites"],
            "reading_time": 5,
            "featured": false,
            "is_published": true
        })
    }

    #[tokio::test]
    async fn test_published_posts_skips_invalid_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(query_param("is_published", "eq.true"))
            .and(query_param("order", "published_date.desc"))
            .and(header("apikey", "anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                row("limites", "Disciplina Positiva"),
                row("cocina", "Cocina")
            ])))
            .mount(&server)
            .await;

        let posts = repo(&server).published_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug, "limites");
        assert_eq!(posts[0].id, "1");
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/lead_records"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "PGRST205",
                "message": "Could not find the table 'public.lead_records' in the schema cache"
            })))
            .mount(&server)
            .await;

        assert!(repo(&server).leads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = repo(&server).all_posts().await.unwrap_err();
        assert!(matches!(err, RepositoryError::Backend { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_create_lead_uses_session_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/lead_records"))
            .and(header("authorization", "Bearer session-token"))
            .and(header("prefer", "return=representation"))
            .and(body_partial_json(json!({"email": "ana@example.com"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": "b7c1",
                "email": "ana@example.com",
                "created_at": "2025-02-01T09:00:00.123456+00:00",
                "source_page": "descarga-guia"
            }])))
            .mount(&server)
            .await;

        let repo = repo(&server).authorized("session-token");
        let lead = repo
            .create_lead(&LeadDraft::new("ana@example.com", ""))
            .await
            .unwrap();
        assert_eq!(lead.id, "b7c1");
        assert_eq!(lead.source_page, "descarga-guia");
    }

    #[tokio::test]
    async fn test_delete_missing_post_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/posts"))
            .and(query_param("id", "eq.99"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = repo(&server).delete_post("99").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
