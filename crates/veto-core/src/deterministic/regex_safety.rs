//! ReDoS pre-filter (C1): reject patterns before they are ever compiled.
//!
//! The three shapes rejected here are ported verbatim from the reference
//! implementation's `deterministic/regex_safety.py` so that the set of
//! accepted/rejected patterns stays identical across language
//! implementations. This is a compatibility surface, not a place for
//! creative improvement.

use regex::Regex;
use std::sync::OnceLock;

pub const MAX_PATTERN_LENGTH: usize = 256;

fn nested_quantifier_on_group() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+*}]\s*\)\s*[+*{]").unwrap())
}

fn adjacent_quantifiers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+*}]\s*[+*{]").unwrap())
}

fn overlapping_alternation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\*.*\|.*\.\*").unwrap())
}

/// Conservative pre-filter over a regex pattern, applied before compilation.
///
/// Rejects, in order: patterns longer than [`MAX_PATTERN_LENGTH`]; a
/// quantifier directly closing a group followed by another quantifier (the
/// classic nested-quantifier ReDoS shape, e.g. `(a+)+`); two quantifier
/// tokens adjacent with only whitespace between them; and alternation where
/// both sides begin with a wildcard-star (`.*foo|.*bar`).
///
/// This is a conservative filter: it may reject some safe patterns, but it
/// must never accept any of the shapes above.
pub fn is_safe_pattern(pattern: &str) -> bool {
    if pattern.chars().count() > MAX_PATTERN_LENGTH {
        return false;
    }
    if nested_quantifier_on_group().is_match(pattern) {
        return false;
    }
    if adjacent_quantifiers().is_match(pattern) {
        return false;
    }
    if overlapping_alternation().is_match(pattern) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_256_char_pattern() {
        let pattern = "a".repeat(256);
        assert!(is_safe_pattern(&pattern));
    }

    #[test]
    fn rejects_257_char_pattern() {
        let pattern = "a".repeat(257);
        assert!(!is_safe_pattern(&pattern));
    }

    #[test]
    fn rejects_classic_nested_quantifier_shapes() {
        assert!(!is_safe_pattern("(a+)+"));
        assert!(!is_safe_pattern("(a*)*"));
    }

    #[test]
    fn rejects_overlapping_alternation() {
        assert!(!is_safe_pattern(".*foo|.*bar"));
    }

    #[test]
    fn accepts_plain_alternation() {
        assert!(is_safe_pattern("foo|bar|baz"));
    }

    #[test]
    fn accepts_ordinary_patterns() {
        assert!(is_safe_pattern(r"^[a-z0-9_-]{3,16}$"));
        assert!(is_safe_pattern(r"\d{4}-\d{2}-\d{2}"));
    }

    #[test]
    fn rejects_adjacent_quantifier_tokens() {
        assert!(!is_safe_pattern("a*+b"));
        assert!(!is_safe_pattern("a}{2}"));
    }
}
