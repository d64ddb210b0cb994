/// Match Engine: scans currently rendered tweets for the search target
///
/// Markup varies between rendered items (truncation, quoted tweets, embeds),
/// so both text and author matching layer several extraction strategies and
/// accept the first that holds. First match in document order wins; there is
/// no ranking.

use crate::page::TweetView;
use crate::session::SearchCriteria;

#[derive(Debug, Clone, PartialEq)]
pub struct TweetMatch {
    /// Index into the rendered set, in document order.
    pub index: usize,
    /// Human-readable description of which criteria matched.
    pub reason: String,
}

/// Find the first rendered tweet satisfying the criteria. Both text and
/// author conditions must hold on the same item; absent criteria hold
/// vacuously. Returns None when nothing matches (never errors).
pub fn find_match(tweets: &[TweetView], criteria: &SearchCriteria) -> Option<TweetMatch> {
    if criteria.is_empty() {
        return None;
    }

    for (index, tweet) in tweets.iter().enumerate() {
        let blob = text_blob(tweet);

        let text_ok = match &criteria.text {
            Some(needle) => blob.contains(needle.as_str()),
            None => true,
        };
        if !text_ok {
            continue;
        }

        let author_ok = match &criteria.author {
            Some(handle) => author_matches(tweet, &blob, handle),
            None => true,
        };
        if !author_ok {
            continue;
        }

        return Some(TweetMatch {
            index,
            reason: match_reason(criteria),
        });
    }

    None
}

/// Union the item's text sources into one lowercased blob, dropping any
/// source already contained in another (rendered text is usually a prefix
/// of the full underlying text).
pub fn text_blob(tweet: &TweetView) -> String {
    let mut kept: Vec<String> = Vec::new();
    for text in &tweet.texts {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            continue;
        }
        if kept.iter().any(|k| k.contains(&text)) {
            continue;
        }
        kept.retain(|k| !text.contains(k.as_str()));
        kept.push(text);
    }
    kept.join(" ")
}

fn author_matches(tweet: &TweetView, blob: &str, handle: &str) -> bool {
    // Outbound profile link whose path is exactly the handle.
    let profile_path = format!("/{}", handle);
    if tweet
        .link_paths
        .iter()
        .any(|p| p.trim_end_matches('/').eq_ignore_ascii_case(&profile_path))
    {
        return true;
    }

    // "@handle" as a whole token anywhere in the blob.
    if contains_handle_token(blob, handle) {
        return true;
    }

    // aria-label or user-identifying attribute mentioning the handle.
    if tweet
        .aria_labels
        .iter()
        .any(|label| label.to_lowercase().contains(handle))
    {
        return true;
    }

    // A short inline text node equal to the handle, with or without "@".
    if tweet.inline_handles.iter().any(|node| {
        let node = node.trim().trim_start_matches('@').to_lowercase();
        node == handle
    }) {
        return true;
    }

    // Any link whose path mentions "/handle" (status permalinks qualify).
    let fragment = format!("/{}", handle);
    tweet
        .link_paths
        .iter()
        .any(|p| p.to_lowercase().contains(&fragment))
}

/// Whole-token search for "@handle": the character after the handle must not
/// extend it ("@alice" must not match "@alicedoe").
fn contains_handle_token(blob: &str, handle: &str) -> bool {
    let token = format!("@{}", handle);
    let mut start = 0;
    while let Some(pos) = blob[start..].find(&token) {
        let end = start + pos + token.len();
        let extended = blob[end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if !extended {
            return true;
        }
        start = end;
    }
    false
}

fn match_reason(criteria: &SearchCriteria) -> String {
    match (&criteria.text, &criteria.author) {
        (Some(text), Some(author)) => {
            format!("Found tweet matching \"{}\" from @{}", text, author)
        }
        (Some(text), None) => format!("Found tweet matching \"{}\"", text),
        (None, Some(author)) => format!("Found tweet from @{}", author),
        (None, None) => "Found tweet".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet_with_text(text: &str) -> TweetView {
        TweetView {
            texts: vec![text.to_string()],
            ..TweetView::default()
        }
    }

    #[test]
    fn test_text_match_case_insensitive() {
        let tweets = vec![
            tweet_with_text("nothing interesting"),
            tweet_with_text("Rust 1.85 RELEASED today"),
        ];
        let m = find_match(&tweets, &SearchCriteria::new("rust 1.85", "")).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.reason, "Found tweet matching \"rust 1.85\"");
    }

    #[test]
    fn test_no_match_returns_none() {
        let tweets = vec![tweet_with_text("hello"), tweet_with_text("world")];
        assert_eq!(find_match(&tweets, &SearchCriteria::new("absent", "")), None);
        assert_eq!(find_match(&[], &SearchCriteria::new("anything", "")), None);
    }

    #[test]
    fn test_empty_criteria_never_match() {
        let tweets = vec![tweet_with_text("hello")];
        assert_eq!(find_match(&tweets, &SearchCriteria::default()), None);
    }

    #[test]
    fn test_first_match_wins() {
        let tweets = vec![
            tweet_with_text("rust is great"),
            tweet_with_text("rust is also here"),
        ];
        let m = find_match(&tweets, &SearchCriteria::new("rust", "")).unwrap();
        assert_eq!(m.index, 0);
    }

    #[test]
    fn test_blob_dedupes_contained_texts() {
        let tweet = TweetView {
            texts: vec![
                "Short preview".to_string(),
                "Short preview with the full hidden remainder".to_string(),
                "Short preview".to_string(),
            ],
            ..TweetView::default()
        };
        assert_eq!(text_blob(&tweet), "short preview with the full hidden remainder");
    }

    #[test]
    fn test_author_via_profile_link() {
        let tweet = TweetView {
            texts: vec!["some text".to_string()],
            link_paths: vec!["/alice/".to_string()],
            ..TweetView::default()
        };
        let m = find_match(&[tweet], &SearchCriteria::new("", "@alice")).unwrap();
        assert_eq!(m.reason, "Found tweet from @alice");
    }

    #[test]
    fn test_author_via_handle_token() {
        let tweet = tweet_with_text("replying to @alice about things");
        assert!(find_match(&[tweet], &SearchCriteria::new("", "alice")).is_some());

        // "@alicedoe" is not a whole-token @alice.
        let tweet = tweet_with_text("replying to @alicedoe about things");
        assert_eq!(find_match(&[tweet], &SearchCriteria::new("", "alice")), None);
    }

    #[test]
    fn test_author_via_aria_label() {
        let tweet = TweetView {
            texts: vec!["text".to_string()],
            aria_labels: vec!["Tweet by Alice (@alice)".to_string()],
            ..TweetView::default()
        };
        assert!(find_match(&[tweet], &SearchCriteria::new("", "alice")).is_some());
    }

    #[test]
    fn test_author_via_inline_handle() {
        let tweet = TweetView {
            texts: vec!["text".to_string()],
            inline_handles: vec!["@Alice".to_string()],
            ..TweetView::default()
        };
        assert!(find_match(&[tweet], &SearchCriteria::new("", "alice")).is_some());
    }

    #[test]
    fn test_author_via_status_link() {
        let tweet = TweetView {
            texts: vec!["text".to_string()],
            link_paths: vec!["/alice/status/12345".to_string()],
            ..TweetView::default()
        };
        assert!(find_match(&[tweet], &SearchCriteria::new("", "alice")).is_some());
    }

    #[test]
    fn test_both_criteria_must_hold_on_same_item() {
        let by_alice = TweetView {
            texts: vec!["about cooking".to_string()],
            link_paths: vec!["/alice/status/1".to_string()],
            ..TweetView::default()
        };
        let about_rust = TweetView {
            texts: vec!["about rust".to_string()],
            link_paths: vec!["/bob/status/2".to_string()],
            ..TweetView::default()
        };
        // Text is on one item, author on the other: no cross-item match.
        let criteria = SearchCriteria::new("rust", "alice");
        assert_eq!(find_match(&[by_alice.clone(), about_rust.clone()], &criteria), None);

        let both = TweetView {
            texts: vec!["about rust".to_string()],
            link_paths: vec!["/alice/status/3".to_string()],
            ..TweetView::default()
        };
        let m = find_match(&[by_alice, about_rust, both], &criteria).unwrap();
        assert_eq!(m.index, 2);
        assert_eq!(m.reason, "Found tweet matching \"rust\" from @alice");
    }

    #[test]
    fn test_hidden_text_source_is_searched() {
        let tweet = TweetView {
            texts: vec![
                "visible preview...".to_string(),
                "visible preview... and the truncated needle".to_string(),
            ],
            ..TweetView::default()
        };
        assert!(find_match(&[tweet], &SearchCriteria::new("truncated needle", "")).is_some());
    }
}
