use std::sync::LazyLock;

use regex::Regex;

/// Unit assumed when the query never mentions one.
pub const DEFAULT_UNIT: &str = "cm";

// Longest alternatives first so "inches" is not cut short to "inch", and
// "mm"/"cm" win over the bare "m".
static UNIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+(?:\.\d+)?\s*(inches|inch|cm|mm|m)\b").expect("unit pattern is valid")
});

/// Scans the user query for a number followed by a recognized unit token and
/// returns the canonical (lowercase) unit of the first match, defaulting to
/// [`DEFAULT_UNIT`].
///
/// Only the unit token is kept; the magnitude is discarded. The resolver
/// infers what unit the user means, it never rescales geometry to a target
/// size.
pub fn resolve_unit(query: &str) -> String {
    match UNIT_PATTERN.captures(query) {
        Some(captures) => captures[1].to_lowercase(),
        None => DEFAULT_UNIT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_UNIT, resolve_unit};

    #[test]
    fn finds_unit_after_magnitude() {
        assert_eq!(resolve_unit("draw a 5 cm circle"), "cm");
        assert_eq!(resolve_unit("a 2.5mm gap between lines"), "mm");
        assert_eq!(resolve_unit("a 3 m wall"), "m");
    }

    #[test]
    fn prefers_longer_unit_tokens() {
        assert_eq!(resolve_unit("12 inches wide rectangle"), "inches");
        assert_eq!(resolve_unit("a 1 inch margin"), "inch");
    }

    #[test]
    fn is_case_insensitive_and_canonicalizes_to_lowercase() {
        assert_eq!(resolve_unit("a 10 CM square"), "cm");
        assert_eq!(resolve_unit("roughly 4 Inches tall"), "inches");
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(resolve_unit("5 mm border around a 20 cm canvas"), "mm");
    }

    #[test]
    fn defaults_when_no_unit_is_mentioned() {
        assert_eq!(resolve_unit("draw a circle"), DEFAULT_UNIT);
        assert_eq!(resolve_unit(""), DEFAULT_UNIT);
    }

    #[test]
    fn ignores_units_without_a_magnitude() {
        assert_eq!(resolve_unit("use cm please"), DEFAULT_UNIT);
    }

    #[test]
    fn ignores_unrecognized_unit_words() {
        assert_eq!(resolve_unit("a 3 meters wall"), DEFAULT_UNIT);
    }
}
