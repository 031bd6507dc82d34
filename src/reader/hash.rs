use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

static URL_REGEX: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

// Canonical form: lowercase, URLs stripped, whitespace collapsed. Reposts
// that only differ in links or spacing hash identically.
pub fn canonical_hash(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = url_regex().replace_all(&lowered, "");
    let normalized = without_urls
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::canonical_hash;

    #[test]
    fn ignores_case_urls_and_whitespace() {
        let a = canonical_hash("Big News: rust 2.0 released! https://example.com/post/1");
        let b = canonical_hash("big  news:\nRUST 2.0 released! https://mirror.net/xyz");

        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_text() {
        let a = canonical_hash("rust 2.0 released");
        let b = canonical_hash("go 2.0 released");

        assert_ne!(a, b);
    }

    #[test]
    fn empty_and_url_only_messages_collapse_to_the_same_hash() {
        let a = canonical_hash("https://example.com");
        let b = canonical_hash("   ");

        assert_eq!(a, b);
    }
}
