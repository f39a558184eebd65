//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::repository::Tables;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,
    pub url: String,

    /// Directory holding seed posts (`<content_dir>/posts/*.md`)
    pub content_dir: String,

    /// `long` for "5 de enero de 2025", otherwise a chrono format string
    pub date_format: String,

    pub server: ServerConfig,
    pub supabase: SupabaseConfig,
    pub admin: AdminConfig,
    pub email: EmailConfig,
    pub guide: GuideConfig,
    pub analytics: AnalyticsConfig,
    pub http: HttpConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Crianzas Conscientes".to_string(),
            subtitle: "Acompañamiento en crianza consciente y respetuosa".to_string(),
            description: String::new(),
            author: "Mailen".to_string(),
            language: "es".to_string(),
            timezone: "Europe/Madrid".to_string(),
            url: "http://localhost:4000".to_string(),
            content_dir: "content".to_string(),
            date_format: "long".to_string(),
            server: ServerConfig::default(),
            supabase: SupabaseConfig::default(),
            admin: AdminConfig::default(),
            email: EmailConfig::default(),
            guide: GuideConfig::default(),
            analytics: AnalyticsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Override secrets from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override secrets through `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("SENDGRID_API_KEY") {
            self.email.api_key = key;
        }
        if let Some(url) = get("SUPABASE_URL") {
            self.supabase.url = url;
        }
        if let Some(key) = get("SUPABASE_ANON_KEY") {
            self.supabase.anon_key = key;
        }
    }

    /// Whether a hosted backend is configured
    pub fn uses_backend(&self) -> bool {
        !self.supabase.url.trim().is_empty()
    }

    pub fn tables(&self) -> Tables {
        Tables {
            posts: self.supabase.posts_table.clone(),
            leads: self.supabase.leads_table.clone(),
        }
    }

    /// Where the guide PDF is downloaded from
    pub fn guide_pdf_url(&self) -> String {
        if !self.guide.pdf_url.is_empty() {
            return self.guide.pdf_url.clone();
        }
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.supabase.url.trim_end_matches('/'),
            self.guide.bucket,
            self.guide.object
        )
    }

    /// Configured timezone, UTC when unset or unknown
    pub fn tz(&self) -> chrono_tz::Tz {
        if self.timezone.is_empty() {
            return chrono_tz::UTC;
        }
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown timezone {:?}, using UTC", self.timezone);
            chrono_tz::UTC
        })
    }

    /// Shared HTTP client for outbound calls
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = self.http.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

/// Listen address for `crianzas serve`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

/// Hosted backend (PostgREST, GoTrue and storage)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub posts_table: String,
    pub leads_table: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        let tables = Tables::default();
        Self {
            url: String::new(),
            anon_key: String::new(),
            posts_table: tables.posts,
            leads_table: tables.leads,
        }
    }
}

/// Local admin account, used when no backend is configured
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

/// Outbound email delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    /// Sender name on contact-form notifications
    pub contact_from_name: String,
    /// Site owner: receives contact messages, answers guide replies
    pub owner_email: String,
    pub owner_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            api_key: String::new(),
            from_email: "hola@mailensteinbrenner.com".to_string(),
            from_name: "Crianzas Conscientes".to_string(),
            contact_from_name: "Formulario Web - Crianzas Conscientes".to_string(),
            owner_email: "mailensteinbrenner@gmail.com".to_string(),
            owner_name: "Mailen".to_string(),
        }
    }
}

/// Free guide delivered to new leads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Explicit PDF location; empty means the backend's public storage
    pub pdf_url: String,
    pub bucket: String,
    pub object: String,
    pub filename: String,
    pub subject: String,
    /// Bytes per base64 chunk, rounded down to a multiple of 3
    pub chunk_size: usize,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            pdf_url: String::new(),
            bucket: "guide-pdfs".to_string(),
            object: "guia-crianza-consciente.pdf".to_string(),
            filename: "Guia-Crianza-Consciente.pdf".to_string(),
            subject: "¡Tu guía de Crianza Consciente está lista! 🌱".to_string(),
            chunk_size: 8190,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    /// GA4 measurement id (`G-XXXXXXX`)
    pub measurement_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for outbound requests; none by default
    pub timeout_secs: Option<u64>,
}
