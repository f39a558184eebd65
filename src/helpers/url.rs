//! URL helper functions

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::config::SiteConfig;

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/blog/limites") // -> "https://example.com/blog/limites"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

/// Encode a query-string component
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Append `key=value` to a path, encoding the value
pub fn with_query(path: &str, key: &str, value: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", path, separator, key, encode_component(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_for() {
        let mut config = SiteConfig::default();
        config.url = "https://example.com/".to_string();
        assert_eq!(
            full_url_for(&config, "/blog/limites"),
            "https://example.com/blog/limites"
        );
    }

    #[test]
    fn test_with_query() {
        assert_eq!(
            with_query("/admin/blog", "notice", "Artículo creado"),
            "/admin/blog?notice=Art%C3%ADculo%20creado"
        );
        assert_eq!(with_query("/blog?tag=x", "q", "a&b"), "/blog?tag=x&q=a%26b");
    }
}
