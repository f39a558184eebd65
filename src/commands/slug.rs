//! Print the slug a post title would get

use anyhow::Result;

use crate::content::derive_slug;

pub fn run(title: &str) -> Result<()> {
    let slug = derive_slug(title);
    if slug.is_empty() {
        anyhow::bail!("Title {:?} has no letters or digits to build a slug from", title);
    }
    println!("{}", slug);
    Ok(())
}
