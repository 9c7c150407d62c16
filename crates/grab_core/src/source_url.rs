use std::sync::LazyLock;

use regex::Regex;

/// Accepted source URLs: canonical domain or short-link alias, optional `www.`,
/// a content-type segment and a non-empty identifier. Anything may follow.
static SOURCE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?(instagram\.com|instagr\.am)/(p|reels?|stories)/[A-Za-z0-9_-]+/?")
        .expect("source url pattern is valid")
});

/// Returns true when `candidate` points at a post, reel or story.
///
/// Callers are expected to trim user input first; surrounding whitespace makes
/// the candidate invalid.
pub fn is_valid_source_url(candidate: &str) -> bool {
    SOURCE_URL.is_match(candidate)
}

/// Extracts the content identifier from a source URL.
///
/// Handles `/p/{id}`, `/reel/{id}`, `/reels/{id}`, `/tv/{id}` and
/// `/stories/{user}/{id}`, ignoring query strings and trailing segments.
pub fn extract_post_id(source_url: &str) -> Option<String> {
    let without_scheme = source_url
        .split_once("://")
        .map_or(source_url, |(_, rest)| rest);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segments: Vec<&str> = path.split('/').skip(1).filter(|s| !s.is_empty()).collect();

    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "p" | "reel" | "reels" | "tv" => {
                return segments.get(i + 1).map(|s| s.to_string());
            }
            "stories" => {
                return segments
                    .get(i + 2)
                    .or_else(|| segments.get(i + 1))
                    .map(|s| s.to_string());
            }
            _ => {}
        }
    }

    None
}

/// Splits pasted input into candidate URLs: one per line or whitespace run,
/// trimmed, empties dropped, order preserved.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(ToOwned::to_owned).collect()
}
