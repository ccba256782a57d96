use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases, trims, and strips diacritics so differently accented spellings
/// of the same name produce the same matching key.
pub fn normalize_text(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Variant for optional upstream fields. A missing value normalizes to "".
pub fn normalize_opt(input: Option<&str>) -> String {
    normalize_text(input.unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_diacritics_and_case() {
        assert_eq!(normalize_text("Café Déjà Vu"), "cafe deja vu");
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(normalize_text("  Montréal  "), "montreal");
    }

    #[test]
    fn test_plain_ascii_passes_through() {
        assert_eq!(normalize_text("the underground club"), "the underground club");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_missing_input() {
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some("Théâtre")), "theatre");
    }
}
