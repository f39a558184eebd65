//! Web server: public pages, admin panel and notification endpoints

mod admin;
mod functions;
mod public;

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::Datelike;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tera::Context;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::analytics::Analytics;
use crate::auth::{AuthProvider, AuthSession, SessionStore, SESSION_COOKIE};
use crate::config::SiteConfig;
use crate::content::{ContentService, MarkdownRenderer};
use crate::notify::Notifier;
use crate::repository::ContentRepository;
use crate::templates::{DateStyle, SiteData, TemplateRenderer};
use crate::Site;

/// Everything a request handler needs
pub struct AppState {
    pub config: SiteConfig,
    pub content: ContentService,
    pub repository: Arc<dyn ContentRepository>,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: SessionStore,
    pub notifier: Arc<Notifier>,
    pub analytics: Analytics,
    pub templates: TemplateRenderer,
    pub renderer: MarkdownRenderer,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire up collaborators for `site` and load the post cache
    pub async fn new(site: &Site) -> Result<Self> {
        let client = site.config.http_client()?;
        let repository = site.repository(client.clone())?;
        let content = ContentService::load(repository.clone()).await;
        tracing::info!("Loaded {} published posts", content.len());

        Ok(Self {
            config: site.config.clone(),
            content,
            auth: site.auth(client.clone()),
            repository,
            sessions: SessionStore::new(),
            notifier: Arc::new(site.notifier(client)),
            analytics: Analytics::new(&site.config.analytics),
            templates: TemplateRenderer::new()?,
            renderer: MarkdownRenderer::new(),
        })
    }

    fn date_style(&self) -> DateStyle<'_> {
        DateStyle {
            tz: self.config.tz(),
            format: &self.config.date_format,
        }
    }

    /// Context shared by every page
    fn context(&self, page_title: &str) -> Context {
        let mut context = Context::new();
        context.insert("site", &SiteData::from(&self.config));
        context.insert("page_title", page_title);
        context.insert(
            "analytics_head",
            &self.analytics.head_snippet().unwrap_or_default(),
        );
        context.insert("analytics_event", "");
        context.insert("notice", "");
        context.insert("error", "");
        context.insert("admin", &false);
        context.insert("year", &chrono::Utc::now().with_timezone(&self.config.tz()).year());
        context
    }

    /// Render a page; a template failure becomes a plain 500
    fn render(&self, template: &str, context: &Context) -> Response {
        match self.templates.render(template, context) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!("Failed to render {}: {:#}", template, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error interno").into_response()
            }
        }
    }

    fn secure_cookies(&self) -> bool {
        self.config.url.starts_with("https://")
    }
}

/// Build the application router
pub fn router(state: SharedState, static_dir: Option<&Path>) -> Router {
    let admin = Router::new()
        .route("/admin", get(|| async { Redirect::to("/admin/dashboard") }))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/logout", post(admin::logout))
        .route(
            "/admin/leads/:id/edit",
            get(admin::edit_lead_page).post(admin::update_lead),
        )
        .route("/admin/leads/:id/delete", post(admin::delete_lead))
        .route("/admin/blog", get(admin::posts))
        .route(
            "/admin/blog/new",
            get(admin::new_post_page).post(admin::create_post),
        )
        .route(
            "/admin/blog/:id/edit",
            get(admin::edit_post_page).post(admin::update_post),
        )
        .route("/admin/blog/:id/delete", post(admin::delete_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let mut app = Router::new()
        .route("/", get(public::home))
        .route("/quien-soy", get(public::about))
        .route("/que-es-crianza-consciente", get(public::what_is))
        .route("/servicios", get(public::services))
        .route("/recursos-digitales", get(public::resources))
        .route(
            "/contacto",
            get(public::contact_page).post(public::submit_contact),
        )
        .route(
            "/descarga-guia",
            get(public::guide_page).post(public::submit_guide),
        )
        .route("/blog", get(public::blog))
        .route("/blog/:slug", get(public::blog_post))
        .route(
            "/admin/login",
            get(admin::login_page).post(admin::login),
        )
        .route(
            "/functions/v1/send-contact-email",
            post(functions::send_contact_email).options(functions::preflight),
        )
        .route(
            "/functions/v1/send-guide-email",
            post(functions::send_guide_email).options(functions::preflight),
        )
        .merge(admin);

    if let Some(dir) = static_dir.filter(|d| d.is_dir()) {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.fallback(|| async { Redirect::to("/") })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: &Site, ip: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState::new(site).await?);
    let app = router(state, Some(&site.static_dir));

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Signed-in admin attached to guarded requests
#[derive(Clone)]
pub struct AdminSession {
    pub id: String,
    pub session: AuthSession,
}

impl AdminSession {
    /// Repository handle acting with this admin's token
    fn repository(&self, state: &AppState) -> Arc<dyn ContentRepository> {
        state.repository.authorized(&self.session.access_token)
    }
}

async fn require_admin(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(admin) = current_session(&state, request.headers()) else {
        return Redirect::to("/admin/login").into_response();
    };
    match fresh_session(&state, admin).await {
        Some(admin) => {
            request.extensions_mut().insert(admin);
            next.run(request).await
        }
        None => Redirect::to("/admin/login").into_response(),
    }
}

/// Refresh an expired backend token, or end the session when that fails
async fn fresh_session(state: &AppState, admin: AdminSession) -> Option<AdminSession> {
    if !admin.session.is_expired(chrono::Utc::now()) {
        return Some(admin);
    }

    match state.auth.refresh(&admin.session).await {
        Ok(session) if state.sessions.replace(&admin.id, session.clone()) => {
            tracing::debug!("Refreshed admin session for {}", session.email);
            Some(AdminSession {
                id: admin.id,
                session,
            })
        }
        Ok(_) => None,
        Err(e) => {
            tracing::info!("Admin session for {} ended: {}", admin.session.email, e);
            state.sessions.remove(&admin.id);
            None
        }
    }
}

fn current_session(state: &AppState, headers: &HeaderMap) -> Option<AdminSession> {
    let id = cookie_value(headers, SESSION_COOKIE)?;
    let session = state.sessions.get(&id)?;
    Some(AdminSession { id, session })
}

/// Value of cookie `name` from the request headers
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn session_cookie(value: &str, max_age: Option<u32>, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/admin; HttpOnly; SameSite=Lax", SESSION_COOKIE, value);
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Analytics;
    use crate::auth::StaticAuth;
    use crate::config::{AnalyticsConfig, EmailConfig, GuideConfig};
    use crate::content::{Category, Post};
    use crate::notify::SendGridMailer;
    use crate::repository::MemoryRepository;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    const BODY: &str = "# Poner límites\n\nLos límites **sostienen** el vínculo.";

    fn seed_post(slug: &str, day: u32, category: Category) -> Post {
        Post {
            id: slug.to_string(),
            slug: slug.to_string(),
            title: format!("Título {}", slug),
            excerpt: "Resumen".to_string(),
            body: BODY.to_string(),
            author: "Mailen".to_string(),
            published_at: Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap(),
            updated_at: None,
            image_url: String::new(),
            category,
            tags: vec!["límites".to_string()],
            reading_time: 3,
            featured: day == 1,
            is_published: true,
        }
    }

    async fn test_state() -> (SharedState, MemoryRepository) {
        let repo = MemoryRepository::with_posts(vec![
            seed_post("limites", 2, Category::Disciplina),
            seed_post("rabietas", 1, Category::Disciplina),
            seed_post("apego", 3, Category::Desarrollo),
        ]);
        let repository: Arc<dyn ContentRepository> = Arc::new(repo.clone());
        let client = reqwest::Client::new();
        let notifier = Notifier::new(
            Arc::new(SendGridMailer::new(client.clone(), "http://127.0.0.1:9/send", "")),
            client,
            EmailConfig::default(),
            GuideConfig::default(),
            "http://127.0.0.1:9/guia.pdf".to_string(),
        );

        let state = AppState {
            config: SiteConfig::default(),
            content: ContentService::load(repository.clone()).await,
            repository,
            auth: Arc::new(StaticAuth::new("admin@example.com", "secreto")),
            sessions: SessionStore::new(),
            notifier: Arc::new(notifier),
            analytics: Analytics::new(&AnalyticsConfig::default()),
            templates: TemplateRenderer::new().unwrap(),
            renderer: MarkdownRenderer::new(),
        };
        (Arc::new(state), repo)
    }

    fn app(state: &SharedState) -> Router {
        router(state.clone(), None)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn sign_in(state: &SharedState) -> String {
        let response = app(state)
            .oneshot(form("/admin/login", "email=admin%40example.com&password=secreto", None))
            .await
            .unwrap();
        assert_eq!(location(&response), "/admin/dashboard");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_home_lists_recent_posts() {
        let (state, _) = test_state().await;
        let response = app(&state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Título apego"));
        assert!(html.contains("3 de enero de 2025"));
    }

    #[tokio::test]
    async fn test_blog_post_renders_markdown() {
        let (state, _) = test_state().await;
        let response = app(&state)
            .oneshot(Request::get("/blog/limites").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<h1>Poner límites</h1>"));
        assert!(html.contains("<strong>sostienen</strong>"));
        // related: same category, not itself
        assert!(html.contains("/blog/rabietas?from=limites"));
        assert!(!html.contains("/blog/apego?from"));
    }

    #[tokio::test]
    async fn test_unknown_post_redirects_to_blog() {
        let (state, _) = test_state().await;
        let response = app(&state)
            .oneshot(Request::get("/blog/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/blog");
    }

    #[tokio::test]
    async fn test_blog_category_filter() {
        let (state, _) = test_state().await;
        let response = app(&state)
            .oneshot(
                Request::get("/blog?category=Desarrollo%20Infantil")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Título apego"));
        assert!(!html.contains("Título limites"));
    }

    #[tokio::test]
    async fn test_admin_requires_session() {
        let (state, _) = test_state().await;
        for uri in ["/admin/dashboard", "/admin/blog", "/admin/blog/new"] {
            let response = app(&state)
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert!(response.status().is_redirection(), "{}", uri);
            assert_eq!(location(&response), "/admin/login");
        }

        let response = app(&state)
            .oneshot(
                Request::get("/admin/dashboard")
                    .header(header::COOKIE, "crianzas_session=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(location(&response), "/admin/login");
    }

    #[tokio::test]
    async fn test_wrong_password_shows_error() {
        let (state, _) = test_state().await;
        let response = app(&state)
            .oneshot(form("/admin/login", "email=admin%40example.com&password=mal", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Email o contraseña incorrectos"));
    }

    #[tokio::test]
    async fn test_admin_create_post_reloads_content() {
        let (state, _) = test_state().await;
        let cookie = sign_in(&state).await;

        let dashboard = app(&state)
            .oneshot(
                Request::get("/admin/dashboard")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(dashboard.status(), StatusCode::OK);

        let body = "title=%C2%BFQu%C3%A9+es+la+Crianza+Consciente%3F&slug=&excerpt=Intro\
                    &content=Texto&category=Vida+Familiar&tags=familia%2C+v%C3%ADnculo\
                    &published_date=2025-02-01&reading_time=&is_published=true";
        let response = app(&state)
            .oneshot(form("/admin/blog/new", body, Some(&cookie)))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert!(location(&response).starts_with("/admin/blog?notice="));

        let post = state.content.by_slug("que-es-la-crianza-consciente").unwrap();
        assert_eq!(post.category, Category::Familia);
        assert_eq!(post.tags, vec!["familia", "vínculo"]);
        assert_eq!(post.reading_time, 1);
    }

    #[tokio::test]
    async fn test_admin_post_validation() {
        let (state, _) = test_state().await;
        let cookie = sign_in(&state).await;
        let response = app(&state)
            .oneshot(form("/admin/blog/new", "title=Solo+titulo", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Por favor, completa todos los campos requeridos."));
        assert!(html.contains("Solo titulo"));
        assert_eq!(state.content.len(), 3);
    }

    #[tokio::test]
    async fn test_admin_delete_post() {
        let (state, _) = test_state().await;
        let cookie = sign_in(&state).await;
        let response = app(&state)
            .oneshot(form("/admin/blog/apego/delete", "", Some(&cookie)))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert!(state.content.by_slug("apego").is_none());
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (state, _) = test_state().await;
        let cookie = sign_in(&state).await;
        let response = app(&state)
            .oneshot(form("/admin/logout", "", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(location(&response), "/admin/login");

        let response = app(&state)
            .oneshot(
                Request::get("/admin/dashboard")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(location(&response), "/admin/login");
    }

    fn dashboard_request(cookie: &str) -> Request<Body> {
        Request::get("/admin/dashboard")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn expired_session(refresh_token: Option<&str>) -> AuthSession {
        AuthSession {
            email: "mailen@example.com".to_string(),
            access_token: "jwt-viejo".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
        }
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_is_ended() {
        let (state, _) = test_state().await;
        let id = state.sessions.insert(expired_session(None));
        let cookie = format!("{}={}", SESSION_COOKIE, id);

        let response = app(&state).oneshot(dashboard_request(&cookie)).await.unwrap();
        assert_eq!(location(&response), "/admin/login");
        assert!(state.sessions.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-nuevo",
                "refresh_token": "r2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (state, _) = test_state().await;
        let mut state = Arc::try_unwrap(state).ok().unwrap();
        state.auth = Arc::new(crate::auth::SupabaseAuth::new(
            reqwest::Client::new(),
            &server.uri(),
            "anon",
        ));
        let state = Arc::new(state);

        let id = state.sessions.insert(expired_session(Some("r1")));
        let cookie = format!("{}={}", SESSION_COOKIE, id);

        let response = app(&state).oneshot(dashboard_request(&cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session = state.sessions.get(&id).unwrap();
        assert_eq!(session.access_token, "jwt-nuevo");
        assert!(!session.is_expired(Utc::now()));

        // the refreshed session is used as is on the next request
        let response = app(&state).oneshot(dashboard_request(&cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_guide_form_records_lead() {
        let (state, repo) = test_state().await;
        let response = app(&state)
            .oneshot(form("/descarga-guia", "email=no-es-email", None))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Por favor, ingresa un email válido."));
        assert!(repo.leads().await.unwrap().is_empty());

        let response = app(&state)
            .oneshot(form("/descarga-guia", "email=ana%40example.com&source_page=", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let leads = repo.leads().await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].source_page, "descarga-guia");
    }

    #[tokio::test]
    async fn test_contact_form_without_api_key_shows_error() {
        let (state, _) = test_state().await;
        let body = "name=Ana&email=ana%40example.com&subject=session&message=Hola";
        let response = app(&state)
            .oneshot(form("/contacto", body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("No se pudo enviar el mensaje"));
        assert!(html.contains("value=\"Ana\""));
    }

    #[tokio::test]
    async fn test_function_endpoints() {
        let (state, _) = test_state().await;
        let json = |uri: &str, body: &str| {
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = app(&state)
            .oneshot(json("/functions/v1/send-guide-email", r#"{"record":{}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(&state)
            .oneshot(json("/functions/v1/send-guide-email", r#"{"email":"ana@example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("SENDGRID_API_KEY no configurada"));

        let response = app(&state)
            .oneshot(json("/functions/v1/send-contact-email", r#"{"name":"Ana"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );

        let response = app(&state)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/functions/v1/send-contact-email")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "a=1; crianzas_session=abc; b=2".parse().unwrap());
        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }
}
