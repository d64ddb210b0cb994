/// Index search query language
///
/// Whitespace-separated terms: `from:<handle>` filters by author (OR across
/// several `from:` terms), `has:<video|image|link>` filters by media
/// presence (AND across `has:` terms), anything else is a free-text
/// substring term (AND across text terms). Categories combine
/// conjunctively. Values may be quoted: `from:"alice"`.

use crate::index::{IndexedTweet, TweetIndex};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub text: Vec<String>,
    pub from: Vec<String>,
    pub has: Vec<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.from.is_empty() && self.has.is_empty()
    }
}

fn term_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\S+:"[^"]*"|\S+"#).expect("term regex"))
}

pub fn parse_query(query: &str) -> QueryFilters {
    let mut filters = QueryFilters::default();
    let query = query.to_lowercase();

    for term in term_regex().find_iter(&query) {
        let term = term.as_str();
        if let Some(value) = term.strip_prefix("from:") {
            let value = value.replace('"', "");
            let value = value.trim_start_matches('@');
            if !value.is_empty() {
                filters.from.push(value.to_string());
            }
        } else if let Some(value) = term.strip_prefix("has:") {
            let value = value.replace('"', "");
            if !value.is_empty() {
                filters.has.push(value);
            }
        } else {
            filters.text.push(term.replace('"', ""));
        }
    }

    filters
}

pub fn matches(tweet: &IndexedTweet, filters: &QueryFilters) -> bool {
    // Every free-text term must appear in the tweet text.
    if !filters.text.iter().all(|term| tweet.text.contains(term)) {
        return false;
    }

    // Any one of the requested authors suffices.
    if !filters.from.is_empty()
        && !filters.from.iter().any(|handle| tweet.author.contains(handle))
    {
        return false;
    }

    // Every media filter must hold; unknown kinds match nothing.
    filters.has.iter().all(|kind| match kind.as_str() {
        "video" => tweet.has_video,
        "image" => tweet.has_image,
        "link" | "url" => tweet.has_link,
        _ => false,
    })
}

/// Filter the index. An empty query returns everything. Results come back
/// newest-indexed first.
pub fn search_index(index: &TweetIndex, query: &str) -> Vec<IndexedTweet> {
    let filters = parse_query(query);
    let mut results: Vec<IndexedTweet> = index
        .tweets
        .values()
        .filter(|t| filters.is_empty() || matches(t, &filters))
        .cloned()
        .collect();
    results.sort_by(|a, b| {
        b.indexed_at
            .partial_cmp(&a.indexed_at)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::TweetCapture;

    fn seed_index() -> TweetIndex {
        let mut index = TweetIndex::new();
        let rows = [
            ("/alice/status/1", "hello world from the timeline", false, true, false),
            ("/alice/status/2", "another day another scroll", true, false, false),
            ("/bob/status/3", "hello again with a link", false, false, true),
            ("/carol/status/4", "nothing to see here", false, false, false),
        ];
        for (i, (permalink, text, video, image, link)) in rows.iter().enumerate() {
            let c = TweetCapture {
                permalink: Some(permalink.to_string()),
                text: text.to_string(),
                author: None,
                has_video: *video,
                has_image: *image,
                has_link: *link,
            };
            index.merge(&c, (i + 1) as f64);
        }
        index
    }

    #[test]
    fn test_parse_query_categories() {
        let filters = parse_query("hello from:Alice has:image world");
        assert_eq!(filters.text, vec!["hello", "world"]);
        assert_eq!(filters.from, vec!["alice"]);
        assert_eq!(filters.has, vec!["image"]);
    }

    #[test]
    fn test_parse_quoted_values() {
        let filters = parse_query(r#"from:"alice" "exact words""#);
        assert_eq!(filters.from, vec!["alice"]);
        // Plain quoted phrases still split on whitespace; only
        // category-prefixed values keep spaces together.
        assert_eq!(filters.text, vec!["exact", "words"]);
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let index = seed_index();
        assert_eq!(search_index(&index, "").len(), 4);
        assert_eq!(search_index(&index, "   ").len(), 4);
    }

    #[test]
    fn test_conjunctive_across_categories() {
        let index = seed_index();
        // Text AND author AND media must all hold on the same record.
        let results = search_index(&index, "hello from:alice has:image");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");
    }

    #[test]
    fn test_from_is_disjunctive() {
        let index = seed_index();
        let results = search_index(&index, "from:alice from:bob");
        let mut ids: Vec<&str> = results.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_text_terms_are_conjunctive() {
        let index = seed_index();
        let results = search_index(&index, "hello link");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "3");
    }

    #[test]
    fn test_has_terms_are_conjunctive() {
        let index = seed_index();
        assert!(search_index(&index, "has:video has:image").is_empty());
        assert_eq!(search_index(&index, "has:video").len(), 1);
    }

    #[test]
    fn test_has_url_alias_and_unknown_kind() {
        let index = seed_index();
        assert_eq!(search_index(&index, "has:url").len(), 1);
        assert!(search_index(&index, "has:banana").is_empty());
    }

    #[test]
    fn test_results_newest_first() {
        let index = seed_index();
        let results = search_index(&index, "hello");
        assert_eq!(results[0].id, "3");
        assert_eq!(results[1].id, "1");
    }

    #[test]
    fn test_from_accepts_at_prefix() {
        let index = seed_index();
        assert_eq!(search_index(&index, "from:@carol").len(), 1);
    }
}
