/// Tweet index: persistent records keyed by the permalink status id
///
/// The index is append-only except for an explicit full reindex, which
/// clears and rebuilds it. Merging an id that is already present is a no-op,
/// so repeated indexing passes over the same rendered window are harmless.

use crate::page::TweetCapture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTweet {
    pub id: String,
    /// Lowercased for search.
    pub text: String,
    /// Lowercased handle, no leading "@".
    pub author: String,
    pub has_video: bool,
    pub has_image: bool,
    pub has_link: bool,
    pub url: String,
    /// Milliseconds since the epoch, as the host clock reports it.
    pub indexed_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TweetIndex {
    pub tweets: HashMap<String, IndexedTweet>,
    pub last_indexed_id: Option<String>,
    pub total_count: usize,
    pub last_updated: f64,
}

impl TweetIndex {
    pub fn new() -> TweetIndex {
        TweetIndex {
            tweets: HashMap::new(),
            last_indexed_id: None,
            total_count: 0,
            last_updated: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.tweets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweets.is_empty()
    }

    /// Merge one capture. Returns true if a new record was added; an already
    /// indexed id or an unusable capture changes nothing.
    pub fn merge(&mut self, capture: &TweetCapture, now: f64) -> bool {
        let Some(record) = record_from_capture(capture, now) else {
            return false;
        };
        if self.tweets.contains_key(&record.id) {
            return false;
        }
        self.last_indexed_id = Some(record.id.clone());
        self.tweets.insert(record.id.clone(), record);
        self.total_count = self.tweets.len();
        self.last_updated = now;
        true
    }

    /// Merge every capture; returns how many records were actually added.
    pub fn merge_all(&mut self, captures: &[TweetCapture], now: f64) -> usize {
        captures.iter().filter(|c| self.merge(c, now)).count()
    }

    /// Full reindex support: drop everything.
    pub fn clear(&mut self) {
        self.tweets.clear();
        self.last_indexed_id = None;
        self.total_count = 0;
    }

    /// Distinct authors across the index.
    pub fn author_count(&self) -> usize {
        let authors: std::collections::HashSet<&str> =
            self.tweets.values().map(|t| t.author.as_str()).collect();
        authors.len()
    }
}

impl Default for TweetIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a record from a raw capture. Extraction is defensive: no permalink,
/// no derivable id, or no author means the item is skipped.
fn record_from_capture(capture: &TweetCapture, now: f64) -> Option<IndexedTweet> {
    let permalink = capture.permalink.as_deref()?;
    let id = tweet_id_from_permalink(permalink)?;
    let author = capture
        .author
        .clone()
        .or_else(|| author_from_permalink(permalink))?;
    Some(IndexedTweet {
        id,
        text: capture.text.to_lowercase(),
        author: author.trim_start_matches('@').to_lowercase(),
        has_video: capture.has_video,
        has_image: capture.has_image,
        has_link: capture.has_link,
        url: permalink_url(permalink),
        indexed_at: now,
    })
}

/// The stable id is the numeric segment after "/status/" in the permalink
/// path, e.g. "/alice/status/123456" -> "123456".
pub fn tweet_id_from_permalink(permalink: &str) -> Option<String> {
    let path = permalink_path(permalink)?;
    let rest = path.split("/status/").nth(1)?;
    let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if id.is_empty() { None } else { Some(id) }
}

/// The author handle is the first path segment of the permalink.
pub fn author_from_permalink(permalink: &str) -> Option<String> {
    let path = permalink_path(permalink)?;
    let handle = path.trim_start_matches('/').split('/').next()?;
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_lowercase())
    }
}

fn permalink_path(permalink: &str) -> Option<String> {
    if permalink.starts_with('/') {
        return Some(permalink.to_string());
    }
    let parsed = url::Url::parse(permalink).ok()?;
    Some(parsed.path().to_string())
}

fn permalink_url(permalink: &str) -> String {
    if permalink.starts_with('/') {
        format!("https://x.com{}", permalink)
    } else {
        permalink.to_string()
    }
}
