//! Slug derivation for titles and collection names

use unicode_normalization::UnicodeNormalization;

/// Derive a slug from a title
///
/// Accents are folded through NFKD, everything outside `[a-z0-9]` becomes a
/// single dash. Slugs are not guaranteed to be unique.
///
/// ```rust
/// assert_eq!(slugify("A Day at the Café"), "a-day-at-the-cafe");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());

    for ch in input.nfkd() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_ascii_whitespace() || ch == '-' || ch == '_' {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
    }

    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My First Entry"), "my-first-entry");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
    }

    #[test]
    fn test_slugify_strips_punctuation() {
        assert_eq!(slugify("Dear diary: it's me!"), "dear-diary-its-me");
    }

    #[test]
    fn test_slugify_folds_accents() {
        assert_eq!(slugify("A Day at the Café"), "a-day-at-the-cafe");
    }

    #[test]
    fn test_slugify_empty_and_symbol_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }
}
