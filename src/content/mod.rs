//! Content module - posts, leads, markdown rendering and the post cache

mod frontmatter;
pub mod loader;
mod markdown;
mod post;
mod service;
mod slug;

pub use frontmatter::FrontMatter;
pub use markdown::{html_escape, MarkdownRenderer};
pub use post::{
    estimate_reading_time, is_valid_email, parse_tags, parse_timestamp, Category, CategoryError,
    LeadDraft, LeadRecord, LeadStats, Post, PostDraft, ValidationError, DEFAULT_LEAD_SOURCE,
};
pub use service::{ContentService, DEFAULT_RECENT};
pub use slug::derive_slug;
