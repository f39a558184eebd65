//! Front-matter parsing for seed post files

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Accept either a single string or a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(tag)) => vec![tag],
        Some(OneOrMany::Many(tags)) => tags,
        None => Vec::new(),
    })
}

/// Metadata block at the top of a seed post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub date: Option<String>,
    pub updated: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,
    pub reading_time: Option<u32>,
    pub featured: bool,
    /// Seed posts are published unless marked otherwise
    pub published: bool,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            slug: None,
            date: None,
            updated: None,
            excerpt: None,
            author: None,
            image: None,
            category: None,
            tags: Vec::new(),
            reading_time: None,
            featured: false,
            published: true,
        }
    }
}

impl FrontMatter {
    /// Split `---`-delimited YAML front-matter from the body.
    ///
    /// Content without a front-matter block is returned whole with default
    /// metadata.
    pub fn parse(content: &str) -> Result<(Self, &str)> {
        let trimmed = content.trim_start();
        let Some(rest) = trimmed.strip_prefix("---") else {
            return Ok((FrontMatter::default(), content));
        };
        let rest = rest.trim_start_matches(['\r', '\n']);

        let Some(end) = rest.find("\n---") else {
            return Err(anyhow!("unterminated front-matter block"));
        };

        let yaml = &rest[..end];
        let body = rest[end + 4..].trim_start_matches(['\r', '\n']);

        if yaml.trim().is_empty() {
            return Ok((FrontMatter::default(), body));
        }

        let fm: FrontMatter = serde_yaml::from_str(yaml)
            .map_err(|e| anyhow!("invalid front-matter: {}", e))?;
        Ok((fm, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Límites con Amor
date: 2025-01-15
category: Disciplina Positiva
tags:
  - límites
  - respeto
featured: true
---

# Límites con Amor
"#;

        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Límites con Amor"));
        assert_eq!(fm.category.as_deref(), Some("Disciplina Positiva"));
        assert_eq!(fm.tags, vec!["límites", "respeto"]);
        assert!(fm.featured);
        assert!(fm.published);
        assert!(body.starts_with("# Límites con Amor"));
    }

    #[test]
    fn test_single_string_tags() {
        let content = "---\ntitle: Uno\ntags: sueño\n---\ncuerpo";
        let (fm, body) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.tags, vec!["sueño"]);
        assert_eq!(body, "cuerpo");
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, body) = FrontMatter::parse("Solo texto").unwrap();
        assert!(fm.title.is_none());
        assert_eq!(body, "Solo texto");
    }

    #[test]
    fn test_unterminated_block_is_an_error() {
        assert!(FrontMatter::parse("---\ntitle: x\n").is_err());
    }
}
