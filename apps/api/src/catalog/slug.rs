use unicode_normalization::UnicodeNormalization;

/// Normalizes a handle or title into a lowercase ASCII slug.
///
/// Accents are decomposed and dropped, punctuation other than `_` is removed,
/// and runs of whitespace or hyphens collapse to a single `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.nfkd().filter(char::is_ascii) {
        if c.is_ascii_whitespace() || c == '-' {
            pending_sep = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep {
                slug.push('_');
                pending_sep = false;
            }
            slug.push(c.to_ascii_lowercase());
        }
    }

    slug.trim_matches('_').to_string()
}
