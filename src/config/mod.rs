//! Configuration module

mod site;

pub use site::SiteConfig;
pub use site::{
    AdminConfig, AnalyticsConfig, EmailConfig, GuideConfig, HttpConfig, ServerConfig,
    SupabaseConfig,
};
