use crate::models::Release;

/// The release tag this build was cut from. Compared against the release
/// feed to decide whether an upgrade notification should be shown.
pub const REFERENCE_TAG: &str = concat!("v", env!("CARGO_PKG_VERSION"));

pub const RELEASE_OWNER: &str = "evidence-tray";
pub const RELEASE_REPO: &str = "evidence-tray";
pub const RELEASE_PAGE_URL: &str = "https://github.com/evidence-tray/evidence-tray/releases";

/// Parse the numeric components out of a version tag such as `v1.4.2`.
///
/// Non-numeric prefixes and suffixes are ignored; an empty result means the
/// tag carries no comparable version at all.
fn version_components(tag: &str) -> Vec<u64> {
    let trimmed = tag.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
    trimmed
        .split('.')
        .map_while(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()
        })
        .collect()
}

fn is_newer(candidate: &str, reference: &str) -> bool {
    let candidate = version_components(candidate);
    let reference = version_components(reference);
    if candidate.is_empty() {
        return false;
    }

    let len = candidate.len().max(reference.len());
    for i in 0..len {
        let c = candidate.get(i).copied().unwrap_or(0);
        let r = reference.get(i).copied().unwrap_or(0);
        if c != r {
            return c > r;
        }
    }
    false
}

/// Find the first release whose tag strictly exceeds `reference_tag`.
/// Equal or older tags, and tags with no parseable version, never upgrade.
pub fn upgrade_available<'a>(reference_tag: &str, releases: &'a [Release]) -> Option<&'a Release> {
    releases
        .iter()
        .find(|release| is_newer(&release.tag_name, reference_tag))
}

#[cfg(test)]
mod tests {
    use super::{is_newer, upgrade_available, version_components};
    use crate::models::Release;

    fn release(tag: &str) -> Release {
        Release {
            tag_name: tag.to_string(),
            html_url: String::new(),
        }
    }

    #[test]
    fn parses_tags_with_prefixes() {
        assert_eq!(version_components("v1.2.3"), vec![1, 2, 3]);
        assert_eq!(version_components("release-2.0"), vec![2, 0]);
        assert_eq!(version_components("nightly"), Vec::<u64>::new());
    }

    #[test]
    fn strictly_newer_tags_upgrade() {
        assert!(is_newer("v1.0.1", "v1.0.0"));
        assert!(is_newer("v2.0", "v1.9.9"));
        assert!(!is_newer("v1.0.0", "v1.0.0"));
        assert!(!is_newer("v0.9.9", "v1.0.0"));
        assert!(!is_newer("garbage", "v1.0.0"));
    }

    #[test]
    fn shorter_tags_compare_with_implied_zeros() {
        assert!(is_newer("v1.1", "v1.0.5"));
        assert!(!is_newer("v1.0", "v1.0.0"));
    }

    #[test]
    fn finds_first_newer_release() {
        let releases = vec![release("v0.0.9"), release("v9.9.9"), release("v10.0.0")];
        let found = upgrade_available("v1.0.0", &releases).expect("upgrade");
        assert_eq!(found.tag_name, "v9.9.9");

        assert!(upgrade_available("v99.0.0", &releases).is_none());
    }
}
