//! Case-insensitive, anchored glob matching for intent pattern arrays
//! (spec.md §4.3).
//!
//! Patterns are glob expressions over `*` (any run) and `?` (one char),
//! regex metacharacters escaped, matched in full (anchored at both ends).

/// Compiles `pattern` into an anchored, case-insensitive regex and tests
/// it against `input`. A `None` input matches no pattern.
pub fn glob_match(pattern: &str, input: Option<&str>) -> bool {
    let Some(input) = input else { return false };
    let regex = compile(pattern);
    regex.is_match(input)
}

/// True iff `input` matches any pattern in `patterns`, or `patterns` is empty.
pub fn matches_inclusion(patterns: &[String], input: Option<&str>) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| glob_match(p, input))
}

/// True iff `input` matches no pattern in `patterns`, or `patterns` is empty.
pub fn matches_exclusion(patterns: &[String], input: Option<&str>) -> bool {
    patterns.is_empty() || !patterns.iter().any(|p| glob_match(p, input))
}

fn compile(pattern: &str) -> regex::Regex {
    let mut out = String::with_capacity(pattern.len() * 2 + 4);
    out.push_str("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => {
                if regex_syntax_needs_escape(ch) {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
    }
    out.push('$');
    // The pattern is built here from an escaped literal plus `.*`/`.`, not
    // user-supplied regex, so this can't fail in practice.
    regex::Regex::new(&out).unwrap_or_else(|_| regex::Regex::new("$^").unwrap())
}

fn regex_syntax_needs_escape(ch: char) -> bool {
    matches!(
        ch,
        '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_any_suffix() {
        assert!(glob_match("abc*", Some("ABCD")));
    }

    #[test]
    fn anchored_does_not_match_prefix_only() {
        assert!(!glob_match("abc", Some("xabc")));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(glob_match("web-?", Some("web-1")));
        assert!(!glob_match("web-?", Some("web-12")));
    }

    #[test]
    fn none_input_matches_nothing() {
        assert!(!glob_match("*", None));
    }

    #[test]
    fn empty_inclusion_list_matches_everything() {
        assert!(matches_inclusion(&[], Some("anything")));
        assert!(matches_inclusion(&[], None));
    }

    #[test]
    fn empty_exclusion_list_excludes_nothing() {
        assert!(matches_exclusion(&[], Some("anything")));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert!(glob_match("a.b", Some("a.b")));
        assert!(!glob_match("a.b", Some("aXb")));
    }

    proptest::proptest! {
        #[test]
        fn star_is_always_case_insensitive(s in "[a-zA-Z0-9]{1,10}") {
            let upper = s.to_uppercase();
            let lower = s.to_lowercase();
            proptest::prop_assert!(glob_match(&lower, Some(&upper)));
        }
    }
}
