/// Persisted index storage: key derivation and stored shape
///
/// One `TweetIndex` record is stored per indexed context under a namespaced
/// key, read wholesale at initialization and written wholesale after each
/// successful indexing pass. The async chrome.storage bridge calls live in
/// the runtimes; this module is the pure part.

use crate::index::TweetIndex;

pub const INDEX_KEY_PREFIX: &str = "tweetIndex_";

/// The indexed context for a page URL: the profile handle for a likes
/// timeline, otherwise a host-wide bucket.
pub fn index_context(page_url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(page_url) {
        let segments: Vec<&str> = parsed
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() >= 2 && segments[1] == "likes" {
            return segments[0].to_lowercase();
        }
        if let Some(host) = parsed.host_str() {
            return host.to_lowercase();
        }
    }
    "unknown".to_string()
}

pub fn index_key(page_url: &str) -> String {
    format!("{}{}", INDEX_KEY_PREFIX, index_context(page_url))
}

/// Likes timelines load noticeably slower than other timelines; the session
/// uses a more patient stall policy there.
pub fn is_likes_page(page_url: &str) -> bool {
    url::Url::parse(page_url)
        .map(|u| u.path().trim_end_matches('/').ends_with("/likes"))
        .unwrap_or(false)
}

/// Decode a stored record, tolerating a missing or unreadable value by
/// starting fresh (transient storage inconsistency is not an error).
pub fn decode_stored_index(value: Option<serde_json::Value>) -> TweetIndex {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
