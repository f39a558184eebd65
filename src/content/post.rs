//! Post, category and lead-record models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Blog category, one of six fixed values
///
/// The wire value is the display label, which is what the database stores.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[default]
    #[serde(rename = "Crianza Consciente")]
    Crianza,
    #[serde(rename = "Disciplina Positiva")]
    Disciplina,
    #[serde(rename = "Gestión Emocional")]
    Emociones,
    #[serde(rename = "Desarrollo Infantil")]
    Desarrollo,
    #[serde(rename = "Vida Familiar")]
    Familia,
    #[serde(rename = "Recursos y Herramientas")]
    Recursos,
}

/// Category parse failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("unknown category: {0}")]
    Unknown(String),
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 6] = [
        Category::Crianza,
        Category::Disciplina,
        Category::Emociones,
        Category::Desarrollo,
        Category::Familia,
        Category::Recursos,
    ];

    /// Human-readable label (also the stored value)
    pub fn label(&self) -> &'static str {
        match self {
            Category::Crianza => "Crianza Consciente",
            Category::Disciplina => "Disciplina Positiva",
            Category::Emociones => "Gestión Emocional",
            Category::Desarrollo => "Desarrollo Infantil",
            Category::Familia => "Vida Familiar",
            Category::Recursos => "Recursos y Herramientas",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| CategoryError::Unknown(s.to_string()))
    }
}

/// A blog post as stored in the content repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Repository identifier
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,

    /// URL-safe slug
    pub slug: String,

    pub title: String,

    #[serde(default)]
    pub excerpt: String,

    /// Markdown source
    #[serde(rename = "content", default)]
    pub body: String,

    #[serde(default)]
    pub author: String,

    /// Publication timestamp
    #[serde(rename = "published_date", deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,

    /// Last updated timestamp
    #[serde(
        rename = "updated_date",
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub image_url: String,

    pub category: Category,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Estimated reading time in minutes
    #[serde(default)]
    pub reading_time: u32,

    #[serde(default)]
    pub featured: bool,

    /// Published (true) or draft (false)
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

impl Post {
    /// Whether the post carries `tag`, compared case-insensitively
    pub fn has_tag(&self, tag: &str) -> bool {
        let needle = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == needle)
    }

    /// Case-insensitive substring match over title, excerpt and tags
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&term)
            || self.excerpt.to_lowercase().contains(&term)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&term))
    }

    /// Public URL path of the post
    pub fn path(&self) -> String {
        format!("/blog/{}", self.slug)
    }
}

/// Post fields submitted from the admin form (create or update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    #[serde(rename = "content")]
    pub body: String,
    pub author: String,
    #[serde(rename = "published_date")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "updated_date", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub image_url: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub reading_time: u32,
    pub featured: bool,
    pub is_published: bool,
}

/// Admin form validation failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

impl PostDraft {
    /// A blank draft with the admin-form defaults
    pub fn new(author: &str) -> Self {
        Self {
            slug: String::new(),
            title: String::new(),
            excerpt: String::new(),
            body: String::new(),
            author: author.to_string(),
            published_at: Utc::now(),
            updated_at: None,
            image_url: String::new(),
            category: Category::default(),
            tags: Vec::new(),
            reading_time: 5,
            featured: false,
            is_published: true,
        }
    }

    /// Check that title, slug, excerpt and body are present
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("title", &self.title),
            ("slug", &self.slug),
            ("excerpt", &self.excerpt),
            ("content", &self.body),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }
        Ok(())
    }

    /// Materialize a post with the given id
    pub fn into_post(self, id: String) -> Post {
        Post {
            id,
            slug: self.slug,
            title: self.title,
            excerpt: self.excerpt,
            body: self.body,
            author: self.author,
            published_at: self.published_at,
            updated_at: self.updated_at,
            image_url: self.image_url,
            category: self.category,
            tags: self.tags,
            reading_time: self.reading_time,
            featured: self.featured,
            is_published: self.is_published,
        }
    }
}

impl From<&Post> for PostDraft {
    fn from(post: &Post) -> Self {
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            body: post.body.clone(),
            author: post.author.clone(),
            published_at: post.published_at,
            updated_at: post.updated_at,
            image_url: post.image_url.clone(),
            category: post.category,
            tags: post.tags.clone(),
            reading_time: post.reading_time,
            featured: post.featured,
            is_published: post.is_published,
        }
    }
}

/// Parse a comma-separated tag field: trimmed, deduplicated, empties dropped
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Reading time in minutes at roughly 200 words per minute, never below one
pub fn estimate_reading_time(body: &str) -> u32 {
    let words = body.split_whitespace().count() as u32;
    words.div_ceil(200).max(1)
}

/// Source tag used by the guide-download form
pub const DEFAULT_LEAD_SOURCE: &str = "descarga-guia";

/// A visitor who asked for the free guide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    pub email: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_page: String,
}

/// Fields written when creating or editing a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadDraft {
    pub email: String,
    pub source_page: String,
}

impl LeadDraft {
    pub fn new(email: &str, source_page: &str) -> Self {
        let source_page = if source_page.trim().is_empty() {
            DEFAULT_LEAD_SOURCE
        } else {
            source_page.trim()
        };
        Self {
            email: email.trim().to_string(),
            source_page: source_page.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// Lead counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
}

impl LeadStats {
    pub fn from_leads(leads: &[LeadRecord]) -> Self {
        let mut by_source = BTreeMap::new();
        for lead in leads {
            let source = if lead.source_page.is_empty() {
                "N/A".to_string()
            } else {
                lead.source_page.clone()
            };
            *by_source.entry(source).or_insert(0) += 1;
        }
        Self {
            total: leads.len(),
            by_source,
        }
    }
}

lazy_static::lazy_static! {
    static ref EMAIL_RE: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Email format check used by the contact and guide forms
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Parse a timestamp as stored by the backend: RFC 3339 or a bare date
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    for fmt in formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    // Postgres `timestamptz` without a colon in the offset
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Accept both text (uuid) and integer (bigserial) primary keys
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s)))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s))),
    }
}
