//! Site templates using the Tera template engine
//!
//! All templates are embedded directly in the binary. Autoescaping stays on;
//! rendered post bodies and analytics snippets are marked `safe` explicitly.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{LeadRecord, Post};
use crate::helpers::{date_xml, format_date, input_date};

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("home.html", include_str!("site/home.html")),
            ("about.html", include_str!("site/about.html")),
            ("what_is.html", include_str!("site/what_is.html")),
            ("services.html", include_str!("site/services.html")),
            ("resources.html", include_str!("site/resources.html")),
            ("contact.html", include_str!("site/contact.html")),
            ("guide.html", include_str!("site/guide.html")),
            ("blog.html", include_str!("site/blog.html")),
            ("post.html", include_str!("site/post.html")),
            // Admin
            ("admin/login.html", include_str!("site/admin/login.html")),
            (
                "admin/dashboard.html",
                include_str!("site/admin/dashboard.html"),
            ),
            (
                "admin/lead_form.html",
                include_str!("site/admin/lead_form.html"),
            ),
            ("admin/posts.html", include_str!("site/admin/posts.html")),
            (
                "admin/post_form.html",
                include_str!("site/admin/post_form.html"),
            ),
            // Partials
            (
                "partials/header.html",
                include_str!("site/partials/header.html"),
            ),
            (
                "partials/footer.html",
                include_str!("site/partials/footer.html"),
            ),
            (
                "partials/macros.html",
                include_str!("site/partials/macros.html"),
            ),
        ])?;

        tera.register_filter("truncate_chars", truncate_chars_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}{}",
            truncated.trim_end(),
            omission
        )))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub language: String,
}

impl From<&SiteConfig> for SiteData {
    fn from(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
        }
    }
}

/// Dates are rendered in the site timezone with the configured format
#[derive(Debug, Clone, Copy)]
pub struct DateStyle<'a> {
    pub tz: Tz,
    pub format: &'a str,
}

impl DateStyle<'_> {
    pub fn format(&self, date: &DateTime<Utc>) -> String {
        format_date(date, self.tz, self.format)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub id: String,
    pub slug: String,
    pub path: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub date: String,
    pub date_iso: String,
    pub updated: String,
    pub image_url: String,
    pub category: String,
    pub tags: Vec<String>,
    pub reading_time: u32,
    pub featured: bool,
    pub is_published: bool,
}

impl PostData {
    pub fn new(post: &Post, style: DateStyle<'_>) -> Self {
        Self {
            id: post.id.clone(),
            slug: post.slug.clone(),
            path: post.path(),
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            author: post.author.clone(),
            date: style.format(&post.published_at),
            date_iso: date_xml(&post.published_at),
            updated: post
                .updated_at
                .as_ref()
                .map(|d| style.format(d))
                .unwrap_or_default(),
            image_url: post.image_url.clone(),
            category: post.category.label().to_string(),
            tags: post.tags.clone(),
            reading_time: post.reading_time,
            featured: post.featured,
            is_published: post.is_published,
        }
    }

    pub fn list(posts: &[Post], style: DateStyle<'_>) -> Vec<Self> {
        posts.iter().map(|p| Self::new(p, style)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadData {
    pub id: String,
    pub email: String,
    pub date: String,
    pub source_page: String,
}

impl LeadData {
    pub fn new(lead: &LeadRecord, style: DateStyle<'_>) -> Self {
        Self {
            id: lead.id.clone(),
            email: lead.email.clone(),
            date: style.format(&lead.created_at),
            source_page: lead.source_page.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Admin post form values, as strings the form echoes back
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostFormData {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub published_date: String,
    pub image_url: String,
    pub category: String,
    pub tags: String,
    pub reading_time: u32,
    pub featured: bool,
    pub is_published: bool,
}

impl PostFormData {
    pub fn from_draft(draft: &crate::content::PostDraft, tz: Tz) -> Self {
        Self {
            title: draft.title.clone(),
            slug: draft.slug.clone(),
            excerpt: draft.excerpt.clone(),
            content: draft.body.clone(),
            author: draft.author.clone(),
            published_date: input_date(&draft.published_at, tz),
            image_url: draft.image_url.clone(),
            category: draft.category.label().to_string(),
            tags: draft.tags.join(", "),
            reading_time: draft.reading_time,
            featured: draft.featured,
            is_published: draft.is_published,
        }
    }
}
