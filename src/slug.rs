/// Derive a URL-safe slug from a display name.
///
/// Lowercases the name, collapses every run of non-alphanumeric characters
/// into a single dash, and strips leading/trailing dashes. Returns an empty
/// string when the name contains no letters or digits.
pub fn make_slug_from_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::make_slug_from_name;

    #[test]
    fn lowercases_and_dashes_separators() {
        assert_eq!(make_slug_from_name("Operation Redwood"), "operation-redwood");
        assert_eq!(make_slug_from_name("Red  Team / Q3"), "red-team-q3");
    }

    #[test]
    fn strips_leading_and_trailing_dashes() {
        assert_eq!(make_slug_from_name("  spaced out  "), "spaced-out");
        assert_eq!(make_slug_from_name("!!bang!!"), "bang");
    }

    #[test]
    fn empty_when_no_alphanumerics() {
        assert_eq!(make_slug_from_name(""), "");
        assert_eq!(make_slug_from_name("!@#$%"), "");
    }
}
