//! Analytics - fire-and-forget page and engagement events
//!
//! Events are emitted as structured `tracing` records on the `analytics`
//! target and, for pages, as `gtag` calls in the rendered HTML. Disabled
//! analytics only leaves a debug line behind.

use serde_json::{json, Value};

use crate::config::AnalyticsConfig;

lazy_static::lazy_static! {
    static ref MEASUREMENT_ID_RE: regex::Regex = regex::Regex::new(r"^G-[A-Z0-9]+$").unwrap();
}

/// A tracked event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PageView { path: String },
    BlogPostView { slug: String, title: String },
    RelatedPostClick { from: String, to: String },
    BlogFilter { kind: String, value: String },
    ContactFormSubmit { subject: String },
    GuideDownload { source: String },
    CtaClick { name: String, source: String, destination: String },
}

impl Event {
    /// GA4 event name
    pub fn name(&self) -> &'static str {
        match self {
            Event::PageView { .. } => "page_view",
            Event::BlogPostView { .. } => "blog_post_view",
            Event::RelatedPostClick { .. } => "related_post_click",
            Event::BlogFilter { .. } => "blog_filter",
            Event::ContactFormSubmit { .. } => "contact_form_submit",
            Event::GuideDownload { .. } => "download_guide",
            Event::CtaClick { .. } => "cta_click",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            Event::PageView { path } => json!({ "page_path": path }),
            Event::BlogPostView { slug, title } => json!({
                "post_slug": slug,
                "post_title": title,
                "category": "engagement",
                "label": "Blog Post View",
            }),
            Event::RelatedPostClick { from, to } => json!({
                "from_post": from,
                "to_post": to,
                "category": "engagement",
                "label": "Related Post Click",
            }),
            Event::BlogFilter { kind, value } => json!({
                "filter_type": kind,
                "filter_value": value,
                "category": "engagement",
                "label": "Blog Filter",
            }),
            Event::ContactFormSubmit { subject } => json!({
                "subject": subject,
                "category": "conversion",
                "label": "Contact Form Submission",
            }),
            Event::GuideDownload { source } => json!({
                "guide_name": "Guía de Primeros Pasos en Crianza Consciente",
                "source_page": source,
                "category": "engagement",
                "label": "Free Guide Download",
            }),
            Event::CtaClick {
                name,
                source,
                destination,
            } => json!({
                "cta_name": name,
                "source_page": source,
                "destination": destination,
                "category": "engagement",
                "label": "CTA Click",
            }),
        }
    }
}

/// Analytics collaborator
#[derive(Debug, Clone, Default)]
pub struct Analytics {
    measurement_id: Option<String>,
}

impl Analytics {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let id = config.measurement_id.trim();
        let measurement_id = if !config.enabled {
            None
        } else if MEASUREMENT_ID_RE.is_match(id) {
            Some(id.to_string())
        } else {
            tracing::warn!("Analytics enabled without a valid measurement id, disabling");
            None
        };
        Self { measurement_id }
    }

    pub fn is_enabled(&self) -> bool {
        self.measurement_id.is_some()
    }

    /// Record an event; never fails
    pub fn track(&self, event: &Event) {
        if !self.is_enabled() {
            tracing::debug!("Analytics disabled, would track {} {}", event.name(), event.params());
            return;
        }
        tracing::info!(
            target: "analytics",
            event = event.name(),
            params = %event.params(),
            "event tracked"
        );
    }

    /// GA4 loader for the page head
    pub fn head_snippet(&self) -> Option<String> {
        let id = self.measurement_id.as_deref()?;
        Some(format!(
            concat!(
                "<script async src=\"https://www.googletagmanager.com/gtag/js?id={id}\"></script>\n",
                "<script>window.dataLayer = window.dataLayer || [];",
                "function gtag(){{dataLayer.push(arguments);}}",
                "gtag('js', new Date());gtag('config', '{id}');</script>"
            ),
            id = id
        ))
    }

    /// Inline `gtag('event', ..)` call reporting `event` from the page
    pub fn event_script(&self, event: &Event) -> Option<String> {
        self.measurement_id.as_ref()?;
        // keep `</script>` inside string values from closing the tag
        let params = event.params().to_string().replace('<', "\\u003c");
        Some(format!(
            "<script>gtag('event', '{}', {});</script>",
            event.name(),
            params
        ))
    }
}
