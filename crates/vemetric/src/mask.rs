//! Path masking for reported URLs.
//!
//! A pattern such as `/projects/*/settings` hides the id segment of
//! `/projects/42/settings`, so the URL is reported as
//! `/projects/*/settings`. A `*` matches exactly one segment.

use reqwest::Url;

const WILDCARD: &str = "*";

/// Apply the first matching pattern to the path of `url`.
///
/// URLs that do not parse, or match no pattern, are returned unchanged.
pub fn mask_url(url: &str, patterns: &[String]) -> String {
    if patterns.is_empty() {
        return url.to_string();
    }
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let segments: Vec<&str> = parsed.path().split('/').collect();
    let masked = patterns
        .iter()
        .find_map(|pattern| mask_segments(&segments, pattern));

    match masked {
        Some(path) => {
            parsed.set_path(&path);
            parsed.to_string()
        }
        None => url.to_string(),
    }
}

fn mask_segments(segments: &[&str], pattern: &str) -> Option<String> {
    let pattern: Vec<&str> = pattern.split('/').collect();
    if pattern.len() != segments.len() {
        return None;
    }

    let mut masked = Vec::with_capacity(segments.len());
    for (segment, expected) in segments.iter().zip(&pattern) {
        if *expected == WILDCARD && !segment.is_empty() {
            masked.push(WILDCARD);
        } else if segment == expected {
            masked.push(*segment);
        } else {
            return None;
        }
    }
    Some(masked.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_masks_wildcard_segments() {
        let masked = mask_url(
            "https://x.test/projects/42/settings?tab=a#top",
            &patterns(&["/projects/*/settings"]),
        );
        assert_eq!(masked, "https://x.test/projects/*/settings?tab=a#top");
    }

    #[test]
    fn test_segment_count_must_match() {
        let url = "https://x.test/projects/42/settings/billing";
        assert_eq!(mask_url(url, &patterns(&["/projects/*/settings"])), url);
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let masked = mask_url(
            "https://x.test/users/7",
            &patterns(&["/teams/*", "/users/*", "/*/*"]),
        );
        assert_eq!(masked, "https://x.test/users/*");
    }

    #[test]
    fn test_wildcard_does_not_match_empty_segment() {
        let url = "https://x.test/users/";
        assert_eq!(mask_url(url, &patterns(&["/users/*"])), url);
    }

    #[test]
    fn test_unparseable_url_passes_through() {
        assert_eq!(mask_url("not a url", &patterns(&["/*"])), "not a url");
    }
}
