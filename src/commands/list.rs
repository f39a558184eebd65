//! List site content

use anyhow::Result;
use indexmap::IndexMap;

use crate::content::{Category, Post};
use crate::helpers::full_url_for;
use crate::Site;

/// Count how many posts carry each key, most used first
fn count<'a, I>(keys: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    // stable: ties keep first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Category counts in display order, including empty ones
fn category_counts(posts: &[Post]) -> Vec<(Category, usize)> {
    Category::ALL
        .iter()
        .map(|&c| (c, posts.iter().filter(|p| p.category == c).count()))
        .collect()
}

/// List site content by type
pub async fn run(site: &Site, content_type: &str) -> Result<()> {
    let client = site.config.http_client()?;
    let repository = site.repository(client)?;

    match content_type {
        "post" | "posts" => {
            let posts = repository.all_posts().await?;
            println!("Posts ({}):", posts.len());
            for post in posts {
                let draft = if post.is_published { "" } else { " (borrador)" };
                println!(
                    "  {} - {}{} <{}>",
                    post.published_at.format("%Y-%m-%d"),
                    post.title,
                    draft,
                    full_url_for(&site.config, &post.path())
                );
            }
        }
        "tag" | "tags" => {
            let posts = repository.published_posts().await?;
            let tags = count(posts.iter().flat_map(|p| p.tags.iter().map(String::as_str)));
            println!("Tags ({}):", tags.len());
            for (tag, n) in tags {
                println!("  {} ({})", tag, n);
            }
        }
        "category" | "categories" => {
            let posts = repository.published_posts().await?;
            println!("Categories ({}):", Category::ALL.len());
            for (category, n) in category_counts(&posts) {
                println!("  {} ({})", category, n);
            }
        }
        "lead" | "leads" => {
            let leads = repository.leads().await?;
            println!("Leads ({}):", leads.len());
            for lead in leads {
                println!(
                    "  {} - {} [{}]",
                    lead.created_at.format("%Y-%m-%d %H:%M"),
                    lead.email,
                    lead.source_page
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: posts, tags, categories, leads",
                content_type
            );
        }
    }

    Ok(())
}
