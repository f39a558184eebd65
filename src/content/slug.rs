//! Slug derivation for admin-created posts

/// Derive a URL-safe slug from a post title.
///
/// Lowercases, strips accents, removes anything that is not a letter or a
/// digit, and joins the remaining words with single hyphens:
///
/// ```
/// use crianzas::content::derive_slug;
/// assert_eq!(
///     derive_slug("¿Qué es la Crianza Consciente?"),
///     "que-es-la-crianza-consciente"
/// );
/// ```
///
/// Slug uniqueness is left to the repository.
pub fn derive_slug(title: &str) -> String {
    title
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(slugify_word)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Transliterate one word and drop everything but ASCII letters and digits
fn slugify_word(word: &str) -> String {
    let letters: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
    if letters.is_empty() {
        return letters;
    }
    // transliteration can insert hyphens ("日本" -> "ri-ben")
    slug::slugify(&letters).replace('-', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accents_and_punctuation() {
        assert_eq!(
            derive_slug("¿Qué es la Crianza Consciente?"),
            "que-es-la-crianza-consciente"
        );
        assert_eq!(
            derive_slug("Límites con Amor y Respeto: La Base"),
            "limites-con-amor-y-respeto-la-base"
        );
    }

    #[test]
    fn test_whitespace_and_hyphens_collapse() {
        assert_eq!(derive_slug("  Sueño   y  -- rabietas  "), "sueno-y-rabietas");
        assert_eq!(derive_slug("a - b"), "a-b");
    }

    #[test]
    fn test_inner_punctuation_removed() {
        assert_eq!(derive_slug("It's 5€ (oferta!)"), "its-5-oferta");
    }

    #[test]
    fn test_emoji_dropped() {
        assert_eq!(derive_slug("Hola 🌿 mundo"), "hola-mundo");
    }

    #[test]
    fn test_empty_title() {
        assert_eq!(derive_slug(""), "");
        assert_eq!(derive_slug("¿?!"), "");
    }
}
