use crate::config::Config;
use crate::db::settings;
use aho_corasick::AhoCorasick;
use diesel::PgConnection;

pub const MODE_MIXED: &str = "mixed";
pub const MODE_ALLOWLIST: &str = "allowlist";
pub const MODE_DENYLIST: &str = "denylist";

pub const REASON_FORWARD: &str = "forward";
pub const REASON_TOO_SHORT: &str = "too_short";
pub const REASON_DENY_KEYWORD: &str = "deny_keyword";
pub const REASON_NO_ALLOW_KEYWORD: &str = "no_allow_keyword";
pub const REASON_ADS: &str = "ads";

const DEFAULT_MIN_LENGTH: i64 = 20;

const DEFAULT_AD_KEYWORDS: [&str; 8] = [
    "#ad",
    "#advert",
    "#реклама",
    "sponsored",
    "sponsor:",
    "partner post",
    "промокод",
    "erid",
];

pub struct Filter {
    skip_forwards: bool,
    min_length: usize,
    mode: String,
    allow: Option<AhoCorasick>,
    deny: Option<AhoCorasick>,
    ads: Option<AhoCorasick>,
}

impl Filter {
    pub fn load(conn: &mut PgConnection) -> Self {
        let allow_words = lowercase_all(settings::get_string_list(conn, settings::ALLOW_KEYWORDS));
        let deny_words = lowercase_all(settings::get_string_list(conn, settings::DENY_KEYWORDS));

        let ads_enabled = settings::get_bool(conn, settings::ADS_FILTER_ENABLED, true);

        Self::new(
            settings::get_bool(conn, settings::SKIP_FORWARDS, false),
            settings::get_i64(conn, settings::MIN_LENGTH, DEFAULT_MIN_LENGTH) as usize,
            settings::get_string(conn, settings::KEYWORD_MODE, MODE_MIXED),
            allow_words,
            deny_words,
            ads_enabled,
        )
    }

    pub fn new(
        skip_forwards: bool,
        min_length: usize,
        mode: String,
        allow_words: Vec<String>,
        deny_words: Vec<String>,
        ads_enabled: bool,
    ) -> Self {
        let ads = if ads_enabled {
            build_matcher(
                DEFAULT_AD_KEYWORDS
                    .iter()
                    .map(|word| word.to_string())
                    .collect(),
            )
        } else {
            None
        };

        Self {
            skip_forwards,
            min_length,
            mode,
            allow: build_matcher(allow_words),
            deny: build_matcher(deny_words),
            ads,
        }
    }

    // Returns the drop reason, or None when the message passes.
    pub fn evaluate(&self, text: &str, is_forward: bool) -> Option<&'static str> {
        if self.skip_forwards && is_forward {
            return Some(REASON_FORWARD);
        }

        if text.chars().count() < self.min_length {
            return Some(REASON_TOO_SHORT);
        }

        let lowercase_text = text.to_lowercase();

        if let Some(ads) = &self.ads {
            if ads.find(&lowercase_text).is_some() {
                return Some(REASON_ADS);
            }
        }

        let deny_matches = self
            .deny
            .as_ref()
            .map(|deny| deny.find(&lowercase_text).is_some())
            .unwrap_or(false);

        let allow_matches = self.allow.as_ref().map(|allow| allow.find(&lowercase_text).is_some());

        match self.mode.as_str() {
            MODE_DENYLIST => {
                if deny_matches {
                    return Some(REASON_DENY_KEYWORD);
                }
            }
            MODE_ALLOWLIST => {
                if allow_matches == Some(false) {
                    return Some(REASON_NO_ALLOW_KEYWORD);
                }
            }
            _ => {
                if deny_matches {
                    return Some(REASON_DENY_KEYWORD);
                }

                if allow_matches == Some(false) {
                    return Some(REASON_NO_ALLOW_KEYWORD);
                }
            }
        }

        None
    }
}

// The effective threshold combines the global setting with the per-channel
// delta when auto relevance is on.
pub fn effective_relevance_threshold(
    conn: &mut PgConnection,
    channel: &crate::models::Channel,
) -> f64 {
    let global = settings::get_f64(
        conn,
        settings::RELEVANCE_THRESHOLD,
        Config::relevance_threshold(),
    );

    let base = global.max(Config::relevance_threshold());

    let delta = if settings::get_bool(conn, settings::AUTO_RELEVANCE_ENABLED, false) {
        channel.relevance_delta.unwrap_or(0.0)
    } else {
        0.0
    };

    (base + delta).clamp(0.0, 1.0)
}

fn build_matcher(words: Vec<String>) -> Option<AhoCorasick> {
    if words.is_empty() {
        return None;
    }

    AhoCorasick::new(&words).ok()
}

fn lowercase_all(words: Vec<String>) -> Vec<String> {
    words.into_iter().map(|word| word.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(mode: &str, allow: Vec<&str>, deny: Vec<&str>) -> Filter {
        Filter::new(
            true,
            10,
            mode.to_string(),
            allow.into_iter().map(|word| word.to_string()).collect(),
            deny.into_iter().map(|word| word.to_string()).collect(),
            true,
        )
    }

    #[test]
    fn drops_forwards_when_enabled() {
        let filter = filter(MODE_MIXED, vec![], vec![]);

        assert_eq!(
            filter.evaluate("a long enough message text", true),
            Some(REASON_FORWARD)
        );
        assert_eq!(filter.evaluate("a long enough message text", false), None);
    }

    #[test]
    fn drops_short_messages() {
        let filter = filter(MODE_MIXED, vec![], vec![]);

        assert_eq!(filter.evaluate("short", false), Some(REASON_TOO_SHORT));
    }

    #[test]
    fn deny_keywords_win_in_mixed_mode() {
        let filter = filter(MODE_MIXED, vec!["rust"], vec!["casino"]);

        assert_eq!(
            filter.evaluate("rust news from the casino world", false),
            Some(REASON_DENY_KEYWORD)
        );
        assert_eq!(filter.evaluate("rust news of the week today", false), None);
        assert_eq!(
            filter.evaluate("unrelated gardening message", false),
            Some(REASON_NO_ALLOW_KEYWORD)
        );
    }

    #[test]
    fn allowlist_mode_ignores_deny_patterns() {
        let filter = filter(MODE_ALLOWLIST, vec!["rust"], vec!["casino"]);

        assert_eq!(filter.evaluate("rust in the casino tonight", false), None);
    }

    #[test]
    fn denylist_mode_passes_everything_else() {
        let filter = filter(MODE_DENYLIST, vec!["rust"], vec!["casino"]);

        assert_eq!(filter.evaluate("unrelated gardening message", false), None);
    }

    #[test]
    fn ads_heuristic_catches_default_markers() {
        let filter = filter(MODE_MIXED, vec![], vec![]);

        assert_eq!(
            filter.evaluate("Great product, use our промокод WIN10", false),
            Some(REASON_ADS)
        );
        assert_eq!(
            filter.evaluate("New release announcement #ad", false),
            Some(REASON_ADS)
        );
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        let filter = filter(MODE_MIXED, vec![], vec!["casino"]);

        assert_eq!(
            filter.evaluate("Visit the CASINO right now!!", false),
            Some(REASON_DENY_KEYWORD)
        );
    }
}
