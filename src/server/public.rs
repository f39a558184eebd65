//! Public pages and forms

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use super::SharedState;
use crate::analytics::Event;
use crate::content::{Category, LeadDraft, ValidationError, DEFAULT_LEAD_SOURCE, DEFAULT_RECENT};
use crate::notify::{ContactMessage, NotifyError, CONTACT_SUBJECTS};
use crate::templates::{PostData, SubjectOption};

const RELATED_POSTS: usize = 3;

/// Query parameters any page may carry
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    /// Call-to-action that led here
    pub cta: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub source: Option<String>,
}

fn track_visit(state: &SharedState, path: &str, query: &PageQuery) {
    state.analytics.track(&Event::PageView {
        path: path.to_string(),
    });
    if let Some(cta) = query.cta.as_deref().filter(|c| !c.is_empty()) {
        state.analytics.track(&Event::CtaClick {
            name: cta.to_string(),
            source: query.from.clone().unwrap_or_default(),
            destination: path.to_string(),
        });
    }
}

pub async fn home(State(state): State<SharedState>, Query(query): Query<PageQuery>) -> Response {
    track_visit(&state, "/", &query);
    let style = state.date_style();

    let mut context = state.context("");
    context.insert("featured", &PostData::list(&state.content.featured(), style));
    context.insert(
        "recent",
        &PostData::list(&state.content.recent(DEFAULT_RECENT), style),
    );
    state.render("home.html", &context)
}

fn static_page(
    state: &SharedState,
    query: &PageQuery,
    path: &str,
    template: &str,
    title: &str,
) -> Response {
    track_visit(state, path, query);
    let mut context = state.context(title);
    context.insert("categories", &Category::ALL.map(|c| c.label()));
    state.render(template, &context)
}

pub async fn about(State(state): State<SharedState>, Query(query): Query<PageQuery>) -> Response {
    static_page(&state, &query, "/quien-soy", "about.html", "Quién soy")
}

pub async fn what_is(State(state): State<SharedState>, Query(query): Query<PageQuery>) -> Response {
    static_page(
        &state,
        &query,
        "/que-es-crianza-consciente",
        "what_is.html",
        "¿Qué es la crianza consciente?",
    )
}

pub async fn services(State(state): State<SharedState>, Query(query): Query<PageQuery>) -> Response {
    static_page(&state, &query, "/servicios", "services.html", "Servicios")
}

pub async fn resources(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Response {
    static_page(
        &state,
        &query,
        "/recursos-digitales",
        "resources.html",
        "Recursos digitales",
    )
}

fn contact_response(
    state: &SharedState,
    form: &ContactMessage,
    sent: bool,
    error: &str,
) -> Response {
    let subjects: Vec<SubjectOption> = CONTACT_SUBJECTS
        .iter()
        .map(|&(value, label)| SubjectOption { value, label })
        .collect();

    let mut context = state.context("Contacto");
    context.insert("subjects", &subjects);
    context.insert("form", &ContactFormData::from(form));
    context.insert("sent", &sent);
    context.insert("error", error);
    state.render("contact.html", &context)
}

#[derive(serde::Serialize)]
struct ContactFormData<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

impl<'a> From<&'a ContactMessage> for ContactFormData<'a> {
    fn from(m: &'a ContactMessage) -> Self {
        Self {
            name: &m.name,
            email: &m.email,
            subject: &m.subject,
            message: &m.message,
        }
    }
}

pub async fn contact_page(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Response {
    track_visit(&state, "/contacto", &query);
    let form = ContactMessage {
        subject: query.subject.clone().unwrap_or_default(),
        ..ContactMessage::default()
    };
    contact_response(&state, &form, false, "")
}

pub async fn submit_contact(
    State(state): State<SharedState>,
    Form(message): Form<ContactMessage>,
) -> Response {
    state.analytics.track(&Event::ContactFormSubmit {
        subject: message.subject.clone(),
    });

    match state.notifier.send_contact(&message).await {
        Ok(()) => contact_response(&state, &ContactMessage::default(), true, ""),
        Err(e) => {
            let error = match e {
                NotifyError::MissingFields => "Por favor, completa todos los campos requeridos.",
                NotifyError::InvalidEmail(_) => "Por favor, ingresa un email válido.",
                other => {
                    tracing::error!("Contact message not delivered: {}", other);
                    "No se pudo enviar el mensaje. Por favor, intenta nuevamente."
                }
            };
            contact_response(&state, &message, false, error)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GuideForm {
    pub email: String,
    pub source_page: String,
}

fn guide_response(state: &SharedState, form: &GuideForm, sent: bool, error: &str) -> Response {
    let mut context = state.context("Guía gratuita");
    context.insert("email", &form.email);
    context.insert(
        "source_page",
        if form.source_page.is_empty() {
            DEFAULT_LEAD_SOURCE
        } else {
            form.source_page.as_str()
        },
    );
    context.insert("sent", &sent);
    context.insert("error", error);
    state.render("guide.html", &context)
}

pub async fn guide_page(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Response {
    track_visit(&state, "/descarga-guia", &query);
    let form = GuideForm {
        email: String::new(),
        source_page: query.source.clone().unwrap_or_default(),
    };
    guide_response(&state, &form, false, "")
}

pub async fn submit_guide(State(state): State<SharedState>, Form(form): Form<GuideForm>) -> Response {
    let lead = LeadDraft::new(&form.email, &form.source_page);
    if let Err(e) = lead.validate() {
        let error = match e {
            ValidationError::MissingField(_) => "Por favor, ingresa tu email.",
            _ => "Por favor, ingresa un email válido.",
        };
        return guide_response(&state, &form, false, error);
    }

    if let Err(e) = state.repository.create_lead(&lead).await {
        tracing::error!("Failed to save lead {}: {}", lead.email, e);
        return guide_response(
            &state,
            &form,
            false,
            "Hubo un error al procesar tu solicitud. Por favor, intenta nuevamente.",
        );
    }

    state.analytics.track(&Event::GuideDownload {
        source: lead.source_page.clone(),
    });

    // delivery runs after the response; a failure only shows up in the logs
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier.send_guide(&lead.email).await {
            tracing::error!("Guide not delivered to {}: {}", lead.email, e);
        }
    });

    guide_response(&state, &form, true, "")
}

pub async fn blog(State(state): State<SharedState>, Query(query): Query<PageQuery>) -> Response {
    track_visit(&state, "/blog", &query);

    let category = query
        .category
        .as_deref()
        .and_then(|c| c.parse::<Category>().ok());
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let posts = match (category, tag) {
        (Some(category), _) => {
            state.analytics.track(&Event::BlogFilter {
                kind: "category".to_string(),
                value: category.label().to_string(),
            });
            state.content.by_category(category)
        }
        (None, Some(tag)) => {
            state.analytics.track(&Event::BlogFilter {
                kind: "tag".to_string(),
                value: tag.to_string(),
            });
            state.content.by_tag(tag)
        }
        (None, None) => state.content.all(),
    };

    let mut context = state.context("Blog");
    context.insert("posts", &PostData::list(&posts, state.date_style()));
    context.insert("categories", &Category::ALL.map(|c| c.label()));
    context.insert("tags", &state.content.tags());
    context.insert(
        "selected_category",
        category.map(|c| c.label()).unwrap_or_default(),
    );
    context.insert(
        "selected_tag",
        if category.is_none() { tag.unwrap_or_default() } else { "" },
    );
    state.render("blog.html", &context)
}

pub async fn blog_post(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Some(post) = state.content.by_slug(&slug) else {
        tracing::debug!("No post with slug {:?}", slug);
        return Redirect::to("/blog").into_response();
    };

    let path = post.path();
    track_visit(&state, &path, &query);
    if let Some(from) = query.from.as_deref().filter(|f| !f.is_empty()) {
        state.analytics.track(&Event::RelatedPostClick {
            from: from.to_string(),
            to: post.slug.clone(),
        });
    }
    let view = Event::BlogPostView {
        slug: post.slug.clone(),
        title: post.title.clone(),
    };
    state.analytics.track(&view);

    let style = state.date_style();
    let mut context = state.context(&post.title);
    context.insert("post", &PostData::new(&post, style));
    context.insert("body", &state.renderer.render(&post.body));
    context.insert(
        "related",
        &PostData::list(&state.content.related(&post, RELATED_POSTS), style),
    );
    context.insert(
        "analytics_event",
        &state.analytics.event_script(&view).unwrap_or_default(),
    );
    state.render("post.html", &context)
}
