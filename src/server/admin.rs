//! Admin panel: sign-in, lead dashboard and post CRUD
//!
//! Every write goes through a repository handle carrying the admin's token
//! and, for posts, is followed by a content reload so public pages see it.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;

use super::{current_session, session_cookie, AdminSession, AppState, SharedState};
use crate::auth::AuthError;
use crate::content::{
    derive_slug, estimate_reading_time, parse_tags, Category, LeadDraft, LeadStats, Post,
    PostDraft, ValidationError,
};
use crate::helpers::{parse_input_date, with_query};
use crate::templates::{LeadData, PostData, PostFormData};

/// Flash messages carried across redirects
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Flash {
    pub notice: String,
    pub error: String,
}

fn admin_context(state: &AppState, title: &str, flash: &Flash) -> tera::Context {
    let mut context = state.context(title);
    context.insert("admin", &true);
    context.insert("notice", &flash.notice);
    context.insert("error", &flash.error);
    context
}

fn notice(path: &str, message: &str) -> Response {
    Redirect::to(&with_query(path, "notice", message)).into_response()
}

fn error(path: &str, message: &str) -> Response {
    Redirect::to(&with_query(path, "error", message)).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn login_response(state: &AppState, email: &str, message: &str) -> Response {
    let mut context = state.context("Acceso");
    context.insert("email", email);
    context.insert("error", message);
    state.render("admin/login.html", &context)
}

pub async fn login_page(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if current_session(&state, &headers).is_some() {
        return Redirect::to("/admin/dashboard").into_response();
    }
    login_response(&state, "", "")
}

pub async fn login(State(state): State<SharedState>, Form(form): Form<LoginForm>) -> Response {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return login_response(&state, &form.email, "Por favor completa todos los campos");
    }

    match state.auth.sign_in(form.email.trim(), &form.password).await {
        Ok(session) => {
            tracing::info!("Admin signed in: {}", session.email);
            let id = state.sessions.insert(session);
            let cookie = session_cookie(&id, None, state.secure_cookies());
            ([(header::SET_COOKIE, cookie)], Redirect::to("/admin/dashboard")).into_response()
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Failed admin sign-in for {}", form.email.trim());
            login_response(&state, &form.email, "Email o contraseña incorrectos")
        }
        Err(e) => {
            tracing::error!("Sign-in failed: {}", e);
            login_response(&state, &form.email, "Error al iniciar sesión")
        }
    }
}

pub async fn logout(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
) -> Response {
    state.sessions.remove(&admin.id);
    if let Err(e) = state.auth.sign_out(&admin.session).await {
        tracing::warn!("Sign-out failed: {}", e);
    }
    let cookie = session_cookie("", Some(0), state.secure_cookies());
    ([(header::SET_COOKIE, cookie)], Redirect::to("/admin/login")).into_response()
}

pub async fn dashboard(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Query(mut flash): Query<Flash>,
) -> Response {
    let leads = match admin.repository(&state).leads().await {
        Ok(leads) => leads,
        Err(e) => {
            tracing::error!("Failed to load leads: {}", e);
            flash.error = "Error al cargar los leads.".to_string();
            Vec::new()
        }
    };

    let style = state.date_style();
    let mut context = admin_context(&state, "Panel", &flash);
    context.insert("user_email", &admin.session.email);
    context.insert("stats", &LeadStats::from_leads(&leads));
    context.insert(
        "leads",
        &leads.iter().map(|l| LeadData::new(l, style)).collect::<Vec<_>>(),
    );
    context.insert("post_count", &state.content.len());
    state.render("admin/dashboard.html", &context)
}

#[derive(Debug, Default, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LeadForm {
    pub email: String,
    pub source_page: String,
}

fn lead_form_response(state: &AppState, id: &str, form: &LeadForm, flash: &Flash) -> Response {
    let mut context = admin_context(state, "Editar lead", flash);
    context.insert("lead_id", id);
    context.insert("form", form);
    state.render("admin/lead_form.html", &context)
}

pub async fn edit_lead_page(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Response {
    let lead = match admin.repository(&state).leads().await {
        Ok(leads) => leads.into_iter().find(|l| l.id == id),
        Err(e) => {
            tracing::error!("Failed to load leads: {}", e);
            return error("/admin/dashboard", "Error al cargar los leads.");
        }
    };
    let Some(lead) = lead else {
        return error("/admin/dashboard", "El lead no existe.");
    };

    let form = LeadForm {
        email: lead.email,
        source_page: lead.source_page,
    };
    lead_form_response(&state, &id, &form, &Flash::default())
}

pub async fn update_lead(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
    Form(form): Form<LeadForm>,
) -> Response {
    let draft = LeadDraft::new(&form.email, &form.source_page);
    if draft.validate().is_err() {
        let flash = Flash {
            error: "Por favor, ingresa un email válido.".to_string(),
            ..Flash::default()
        };
        return lead_form_response(&state, &id, &form, &flash);
    }

    match admin.repository(&state).update_lead(&id, &draft).await {
        Ok(_) => notice("/admin/dashboard", "Lead actualizado."),
        Err(e) => {
            tracing::error!("Failed to update lead {}: {}", id, e);
            error("/admin/dashboard", "Error al actualizar el lead.")
        }
    }
}

pub async fn delete_lead(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Response {
    match admin.repository(&state).delete_lead(&id).await {
        Ok(()) => notice("/admin/dashboard", "Lead eliminado."),
        Err(e) => {
            tracing::error!("Failed to delete lead {}: {}", id, e);
            error("/admin/dashboard", "Error al eliminar el lead.")
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostListQuery {
    pub q: String,
    pub category: String,
    pub notice: String,
    pub error: String,
}

/// Search over title, excerpt and tags plus an optional category
fn filter_posts(posts: Vec<Post>, search: &str, category: Option<Category>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|p| category.map_or(true, |c| p.category == c))
        .filter(|p| p.matches_search(search))
        .collect()
}

pub async fn posts(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Query(query): Query<PostListQuery>,
) -> Response {
    let mut flash = Flash {
        notice: query.notice,
        error: query.error,
    };
    let posts = match admin.repository(&state).all_posts().await {
        Ok(posts) => posts,
        Err(e) => {
            tracing::error!("Failed to load posts: {}", e);
            flash.error = "Error al cargar los posts. Por favor, intenta de nuevo.".to_string();
            Vec::new()
        }
    };

    let category = query.category.parse::<Category>().ok();
    let posts = filter_posts(posts, &query.q, category);

    let mut context = admin_context(&state, "Artículos", &flash);
    context.insert("posts", &PostData::list(&posts, state.date_style()));
    context.insert("search", &query.q);
    context.insert("categories", &Category::ALL.map(|c| c.label()));
    context.insert(
        "selected_category",
        category.map(|c| c.label()).unwrap_or_default(),
    );
    state.render("admin/posts.html", &context)
}

/// Raw admin post form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub published_date: String,
    pub image_url: String,
    pub category: String,
    pub tags: String,
    pub reading_time: String,
    pub featured: Option<String>,
    pub is_published: Option<String>,
}

impl PostForm {
    /// Build a draft, filling in the slug, author, date and reading time
    fn into_draft(self, default_author: &str, tz: Tz) -> Result<PostDraft, ValidationError> {
        let category = if self.category.trim().is_empty() {
            Category::default()
        } else {
            self.category.parse::<Category>()?
        };

        let published_at = if self.published_date.trim().is_empty() {
            Utc::now()
        } else {
            parse_input_date(&self.published_date, tz)
                .ok_or_else(|| ValidationError::InvalidDate(self.published_date.clone()))?
        };

        let slug = match self.slug.trim() {
            "" => derive_slug(&self.title),
            slug => slug.to_string(),
        };

        let reading_time = self
            .reading_time
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| *m > 0)
            .unwrap_or_else(|| estimate_reading_time(&self.content));

        let author = match self.author.trim() {
            "" => default_author.to_string(),
            author => author.to_string(),
        };

        let draft = PostDraft {
            slug,
            title: self.title.trim().to_string(),
            excerpt: self.excerpt.trim().to_string(),
            body: self.content,
            author,
            published_at,
            updated_at: None,
            image_url: self.image_url.trim().to_string(),
            category,
            tags: parse_tags(&self.tags),
            reading_time,
            featured: self.featured.is_some(),
            is_published: self.is_published.is_some(),
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Echo the submitted values back into the form
    fn to_form_data(&self) -> PostFormData {
        PostFormData {
            title: self.title.clone(),
            slug: self.slug.clone(),
            excerpt: self.excerpt.clone(),
            content: self.content.clone(),
            author: self.author.clone(),
            published_date: self.published_date.clone(),
            image_url: self.image_url.clone(),
            category: self.category.clone(),
            tags: self.tags.clone(),
            reading_time: self.reading_time.trim().parse().unwrap_or(5),
            featured: self.featured.is_some(),
            is_published: self.is_published.is_some(),
        }
    }
}

fn validation_message(e: &ValidationError) -> String {
    match e {
        ValidationError::MissingField(_) => {
            "Por favor, completa todos los campos requeridos.".to_string()
        }
        ValidationError::Category(e) => format!("Categoría no válida: {}", e),
        ValidationError::InvalidDate(date) => format!("Fecha no válida: {}", date),
        ValidationError::InvalidEmail(email) => format!("Email no válido: {}", email),
    }
}

fn post_form_response(
    state: &AppState,
    post_id: &str,
    form: &PostFormData,
    flash: &Flash,
) -> Response {
    let action = if post_id.is_empty() {
        "/admin/blog/new".to_string()
    } else {
        format!("/admin/blog/{}/edit", crate::helpers::encode_component(post_id))
    };
    let title = if post_id.is_empty() { "Nuevo artículo" } else { "Editar artículo" };

    let mut context = admin_context(state, title, flash);
    context.insert("post_id", post_id);
    context.insert("action", &action);
    context.insert("form", form);
    context.insert("categories", &Category::ALL.map(|c| c.label()));
    context.insert("preview", &state.renderer.render(&form.content));
    state.render("admin/post_form.html", &context)
}

pub async fn new_post_page(State(state): State<SharedState>) -> Response {
    let draft = PostDraft::new(&state.config.author);
    let form = PostFormData::from_draft(&draft, state.config.tz());
    post_form_response(&state, "", &form, &Flash::default())
}

/// Validate and store a post, then refresh the public cache
async fn save_post(
    state: &SharedState,
    admin: &AdminSession,
    id: Option<&str>,
    form: PostForm,
) -> Response {
    let form_data = form.to_form_data();
    let draft = match form.into_draft(&state.config.author, state.config.tz()) {
        Ok(draft) => draft,
        Err(e) => {
            let flash = Flash {
                error: validation_message(&e),
                ..Flash::default()
            };
            return post_form_response(state, id.unwrap_or_default(), &form_data, &flash);
        }
    };

    let repository = admin.repository(state);
    let result = match id {
        Some(id) => repository.update_post(id, &draft).await,
        None => repository.create_post(&draft).await,
    };

    match result {
        Ok(post) => {
            tracing::info!("Saved post {} ({})", post.slug, post.id);
            state.content.reload().await;
            let message = if id.is_some() { "Artículo actualizado." } else { "Artículo creado." };
            notice("/admin/blog", message)
        }
        Err(e) => {
            tracing::error!("Failed to save post {}: {}", draft.slug, e);
            let flash = Flash {
                error: "Error al guardar el post. Por favor, intenta de nuevo.".to_string(),
                ..Flash::default()
            };
            post_form_response(state, id.unwrap_or_default(), &form_data, &flash)
        }
    }
}

pub async fn create_post(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Form(form): Form<PostForm>,
) -> Response {
    save_post(&state, &admin, None, form).await
}

pub async fn edit_post_page(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Response {
    let post = match admin.repository(&state).all_posts().await {
        Ok(posts) => posts.into_iter().find(|p| p.id == id),
        Err(e) => {
            tracing::error!("Failed to load posts: {}", e);
            return error("/admin/blog", "Error al cargar los posts. Por favor, intenta de nuevo.");
        }
    };
    let Some(post) = post else {
        return error("/admin/blog", "El artículo no existe.");
    };

    let form = PostFormData::from_draft(&PostDraft::from(&post), state.config.tz());
    post_form_response(&state, &id, &form, &Flash::default())
}

pub async fn update_post(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> Response {
    save_post(&state, &admin, Some(&id), form).await
}

pub async fn delete_post(
    State(state): State<SharedState>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Response {
    match admin.repository(&state).delete_post(&id).await {
        Ok(()) => {
            state.content.reload().await;
            notice("/admin/blog", "Artículo eliminado.")
        }
        Err(e) => {
            tracing::error!("Failed to delete post {}: {}", id, e);
            error("/admin/blog", "Error al eliminar el post.")
        }
    }
}
