//! URL slug generation for categories and products.

/// Converts free text into a URL slug.
///
/// ASCII letters and digits are kept (lowercased); every run of other
/// characters becomes a single `-`. Leading and trailing dashes are trimmed,
/// so the result may be empty for input without any alphanumerics.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Returns `base` suffixed with `-n` for the given attempt (attempt 1 is `base` itself).
#[must_use]
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}
