//! Version-string normalization and the single source of truth for
//! "is there an update" (spec.md §4.1).

/// `v => lower(trim(stripLeadingV(v)))`.
pub fn normalize(v: &str) -> String {
    let mut stripped = v.trim();
    while let Some(rest) = stripped.strip_prefix(['v', 'V']) {
        stripped = rest;
    }
    stripped.trim().to_lowercase()
}

/// Single source of truth for "is there an update" (spec.md §4.1):
/// - both sides have digests → compare digests exactly.
/// - otherwise → compare normalized versions; equal ⇒ no update, unequal
///   and both non-empty ⇒ update, otherwise ⇒ no update.
pub fn has_update(
    current_digest: Option<&str>,
    current_version: Option<&str>,
    latest_digest: Option<&str>,
    latest_version: Option<&str>,
) -> bool {
    if let (Some(current), Some(latest)) = (current_digest, latest_digest) {
        return current != latest;
    }

    match (current_version, latest_version) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => normalize(a) != normalize(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for v in ["v1.2.3", "V1.2.3", " 1.2.3 ", "1.2.3"] {
            let once = normalize(v);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn normalize_treats_v_prefix_case_and_whitespace_as_equal() {
        let expected = "1.2.3";
        assert_eq!(normalize("v1.2.3"), expected);
        assert_eq!(normalize("V1.2.3"), expected);
        assert_eq!(normalize(" 1.2.3 "), expected);
    }

    #[test]
    fn digest_equality_means_no_update_regardless_of_tag() {
        assert!(!has_update(Some("sha256:aaa"), Some("v1.0.0"), Some("sha256:aaa"), Some("v2.0.0")));
    }

    #[test]
    fn digest_inequality_means_update() {
        assert!(has_update(Some("sha256:aaa"), None, Some("sha256:bbb"), None));
    }

    #[test]
    fn falls_back_to_normalized_tag_equality_without_digests() {
        assert!(!has_update(None, Some("v1.2.3"), None, Some("1.2.3")));
        assert!(has_update(None, Some("v1.2.3"), None, Some("1.2.4")));
    }

    #[test]
    fn missing_version_on_either_side_means_no_update() {
        assert!(!has_update(None, None, None, Some("1.2.3")));
        assert!(!has_update(None, Some("1.2.3"), None, None));
    }

    proptest::proptest! {
        #[test]
        fn normalize_idempotence_property(v in "[a-zA-Z0-9 .\\-]{0,20}") {
            let once = normalize(&v);
            proptest::prop_assert_eq!(normalize(&once).clone(), once);
        }
    }
}
