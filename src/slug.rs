use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Shape of a slug accepted from clients.
pub static SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// Lowercases `title` and collapses every run of non `[a-z0-9]` characters into one `-`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// `base` if it is free, otherwise `base-2`, `base-3`, ... whichever comes first.
pub fn first_free(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Electronics"), "electronics");
        assert_eq!(slugify("Electronics!!"), "electronics");
        assert_eq!(slugify("  Home & Garden -- Tools "), "home-garden-tools");
        assert_eq!(slugify("Größe 42"), "gr-e-42");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn first_free_appends_numeric_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(first_free("electronics", &taken), "electronics");

        taken.insert("electronics".to_string());
        assert_eq!(first_free("electronics", &taken), "electronics-2");

        taken.insert("electronics-2".to_string());
        taken.insert("electronics-4".to_string());
        assert_eq!(first_free("electronics", &taken), "electronics-3");
    }

    #[test]
    fn slug_regex_accepts_only_normalised_slugs() {
        assert!(SLUG_REGEX.is_match("summer-sale-2"));
        assert!(!SLUG_REGEX.is_match("Summer-Sale"));
        assert!(!SLUG_REGEX.is_match("-leading"));
        assert!(!SLUG_REGEX.is_match("double--dash"));
    }
}
