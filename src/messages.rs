/// Command channel wire types
///
/// Requests flow popup -> content script, responses back on the same call;
/// push events flow content script -> popup while a session runs. Action
/// names and field casing are the wire contract shared with the JS bridge.

use crate::index::IndexedTweet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    StartScroll {
        #[serde(default)]
        search_text: String,
        #[serde(default)]
        username: String,
    },
    StopScroll,
    GetStatus,
    JumpToBottom,
    ForceLoad,
    ReindexAll,
    IndexNew,
    SearchIndex {
        query: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Response {
    Status { is_scrolling: bool },
    SearchResults { results: Vec<IndexedTweet> },
    Ack { success: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PushEvent {
    ScrollProgress { progress: String },
    ScrollComplete { reason: String },
}

impl Response {
    pub fn ack() -> Response {
        Response::Ack { success: true }
    }
}
