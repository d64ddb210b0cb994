/// Content-script runtime
///
/// Owns the controller, turns `TickOutcome` values into scheduled timer
/// continuations, dispatches command-channel requests, watches the document
/// for in-place navigation, and runs the indexing passes. Everything here is
/// single-threaded and event-driven; "waiting" always means a scheduled
/// callback, never a blocking wait. Stop cancels by dropping the pending
/// `Timeout` (cancel-on-drop) and resetting the session, so any continuation
/// already queued behind us sees an inactive session and does nothing.

use crate::controller::{ScrollController, TickOutcome};
use crate::dom::DomPage;
use crate::index::TweetIndex;
use crate::messages::{PushEvent, Request, Response};
use crate::page::{ContentLoader, EventSink, PageInspector};
use crate::session::{EndReason, SearchCriteria, SessionConfig, StallTracker};
use crate::{query, storage};
use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{MutationObserver, MutationObserverInit};

#[wasm_bindgen(module = "/js/content_bridge.js")]
extern "C" {
    /// Register the request handler; the bridge forwards
    /// chrome.runtime.onMessage requests and awaits the returned promise.
    fn onRuntimeMessage(handler: &js_sys::Function);

    /// Fire-and-forget push event to whoever is listening (the popup).
    fn sendRuntimeMessage(message: JsValue);

    #[wasm_bindgen(catch)]
    async fn getLocalStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setLocalStorage(key: &str, value: JsValue) -> Result<(), JsValue>;
}

/// Push side of the channel: progress and completion events to the popup.
#[derive(Clone, Copy, Default)]
pub struct ChannelSink;

impl ChannelSink {
    fn send(&self, event: &PushEvent) {
        if let Ok(value) = event.serialize(&serde_wasm_bindgen::Serializer::json_compatible()) {
            sendRuntimeMessage(value);
        }
    }
}

impl EventSink for ChannelSink {
    fn progress(&self, message: &str) {
        self.send(&PushEvent::ScrollProgress {
            progress: message.to_string(),
        });
    }

    fn complete(&self, reason: &EndReason) {
        self.send(&PushEvent::ScrollComplete {
            reason: reason.message(),
        });
    }
}

pub struct ContentRuntime {
    controller: ScrollController<DomPage, ChannelSink>,
    /// The one pending tick or recheck continuation. Dropping it cancels.
    pending: Option<Timeout>,
    observed_url: String,
    indexing: bool,
}

thread_local! {
    static RUNTIME: RefCell<Option<Rc<RefCell<ContentRuntime>>>> = RefCell::new(None);
}

/// Initialize the content-script side: message dispatch, navigation watch,
/// and an incremental index pass for likes timelines.
pub fn init() {
    let page = DomPage::new();
    let url = page.current_url();
    let config = if storage::is_likes_page(&url) {
        SessionConfig::slow_context()
    } else {
        SessionConfig::default()
    };
    let runtime = Rc::new(RefCell::new(ContentRuntime {
        controller: ScrollController::new(page, ChannelSink, config),
        pending: None,
        observed_url: url.clone(),
        indexing: false,
    }));
    RUNTIME.with(|slot| *slot.borrow_mut() = Some(runtime.clone()));

    register_message_handler(runtime.clone());
    observe_navigation(runtime.clone());

    if storage::is_likes_page(&url) {
        spawn_local(index_new(runtime));
    }
    log::info!("content runtime initialized for {}", url);
}

fn register_message_handler(runtime: Rc<RefCell<ContentRuntime>>) {
    let handler = Closure::wrap(Box::new(move |request: JsValue| -> js_sys::Promise {
        let runtime = runtime.clone();
        future_to_promise(async move {
            let request: Request = serde_wasm_bindgen::from_value(request)
                .map_err(|e| JsValue::from_str(&format!("bad request: {}", e)))?;
            let response = dispatch(&runtime, request).await;
            response
                .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                .map_err(|e| JsValue::from_str(&format!("bad response: {}", e)))
        })
    }) as Box<dyn FnMut(JsValue) -> js_sys::Promise>);
    onRuntimeMessage(handler.as_ref().unchecked_ref());
    handler.forget();
}

async fn dispatch(runtime: &Rc<RefCell<ContentRuntime>>, request: Request) -> Response {
    match request {
        Request::StartScroll {
            search_text,
            username,
        } => {
            let criteria = SearchCriteria::new(&search_text, &username);
            let first_delay = runtime.borrow_mut().controller.start(criteria);
            if let Some(delay_ms) = first_delay {
                schedule_tick(runtime.clone(), delay_ms);
            }
            Response::ack()
        }
        Request::StopScroll => {
            let mut rt = runtime.borrow_mut();
            rt.pending = None;
            rt.controller.stop();
            Response::ack()
        }
        Request::GetStatus => Response::Status {
            is_scrolling: runtime.borrow().controller.is_active(),
        },
        Request::JumpToBottom => {
            spawn_local(jump_to_bottom());
            Response::ack()
        }
        Request::ForceLoad => {
            DomPage::new().force_load_burst();
            Response::ack()
        }
        Request::ReindexAll => {
            spawn_local(index_all(runtime.clone(), true));
            Response::ack()
        }
        Request::IndexNew => {
            spawn_local(index_new(runtime.clone()));
            Response::ack()
        }
        Request::SearchIndex { query } => {
            let index = load_index(&DomPage::new().current_url()).await;
            Response::SearchResults {
                results: query::search_index(&index, &query),
            }
        }
    }
}

fn schedule_tick(runtime: Rc<RefCell<ContentRuntime>>, delay_ms: u32) {
    let next = runtime.clone();
    let handle = Timeout::new(delay_ms, move || run_tick(next));
    runtime.borrow_mut().pending = Some(handle);
}

fn schedule_recheck(runtime: Rc<RefCell<ContentRuntime>>, delay_ms: u32) {
    let next = runtime.clone();
    let handle = Timeout::new(delay_ms, move || run_recheck(next));
    runtime.borrow_mut().pending = Some(handle);
}

fn run_tick(runtime: Rc<RefCell<ContentRuntime>>) {
    let outcome = runtime.borrow_mut().controller.tick();
    follow(runtime, outcome);
}

fn run_recheck(runtime: Rc<RefCell<ContentRuntime>>) {
    let outcome = runtime.borrow_mut().controller.recheck();
    follow(runtime, outcome);
}

fn follow(runtime: Rc<RefCell<ContentRuntime>>, outcome: TickOutcome) {
    match outcome {
        TickOutcome::Continue { next_tick_ms } => schedule_tick(runtime, next_tick_ms),
        TickOutcome::AwaitRecheck { delay_ms } => schedule_recheck(runtime, delay_ms),
        TickOutcome::Finished | TickOutcome::Idle => {
            runtime.borrow_mut().pending = None;
        }
    }
}

/// Watch the document for the two signals the controller cares about:
/// in-place navigation (the host is a SPA) and heavy mutation bursts, the
/// latter only as a hint to coax once more while scrolling.
fn observe_navigation(runtime: Rc<RefCell<ContentRuntime>>) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
        let url = DomPage::new().current_url();
        let mut rt = runtime.borrow_mut();
        if url != rt.observed_url {
            rt.observed_url = url;
            rt.pending = None;
            rt.controller.handle_navigation();
            return;
        }
        if rt.controller.is_active() && records.length() > 20 {
            rt.controller.page().nudge();
        }
    }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    if let Ok(observer) = MutationObserver::new(callback.as_ref().unchecked_ref()) {
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        let _ = observer.observe_with_options(&document, &options);
    }
    callback.forget();
}

/// One-shot: jump to the maximum extent, give rendering a moment, force a
/// load, then jump again.
async fn jump_to_bottom() {
    let page = DomPage::new();
    page.scroll_to(page.page_height());
    TimeoutFuture::new(1000).await;
    page.force_load_burst();
    TimeoutFuture::new(500).await;
    page.scroll_to(page.page_height());
}

async fn load_index(page_url: &str) -> TweetIndex {
    let key = storage::index_key(page_url);
    match getLocalStorage(&key).await {
        Ok(value) => {
            storage::decode_stored_index(serde_wasm_bindgen::from_value(value).ok())
        }
        Err(e) => {
            log::warn!("index load failed: {:?}", e);
            TweetIndex::new()
        }
    }
}

async fn save_index(page_url: &str, index: &TweetIndex) -> Result<(), String> {
    let key = storage::index_key(page_url);
    let value = index
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("failed to serialize index: {}", e))?;
    setLocalStorage(&key, value)
        .await
        .map_err(|e| format!("failed to save index: {:?}", e))
}

/// Single pass over currently rendered tweets, no scrolling. Persists only
/// if anything new was merged.
async fn index_new(runtime: Rc<RefCell<ContentRuntime>>) {
    if !begin_indexing(&runtime) {
        return;
    }
    let page = DomPage::new();
    let url = page.current_url();
    let mut index = load_index(&url).await;
    let added = index.merge_all(&page.tweet_captures(), js_sys::Date::now());
    if added > 0 {
        if let Err(e) = save_index(&url, &index).await {
            log::warn!("{}", e);
        }
        log::info!("indexed {} new tweets ({} total)", added, index.len());
    }
    end_indexing(&runtime);
}

/// Full pass: loop the loading primitives and merge every newly rendered
/// tweet until the same stall policy as the scroll session fires, then
/// persist. `clear` first for a full reindex.
async fn index_all(runtime: Rc<RefCell<ContentRuntime>>, clear: bool) {
    if !begin_indexing(&runtime) {
        return;
    }
    let page = DomPage::new();
    let sink = ChannelSink;
    let url = page.current_url();
    let config = if storage::is_likes_page(&url) {
        SessionConfig::slow_context()
    } else {
        SessionConfig::default()
    };

    let mut index = load_index(&url).await;
    if clear {
        index.clear();
    }

    let mut stall = StallTracker::new(page.page_height());
    let mut burst_attempted = false;
    let mut attempts = 0u32;
    let now = js_sys::Date::now;

    loop {
        index.merge_all(&page.tweet_captures(), now());
        sink.progress(&format!("Indexing... {} tweets", index.len()));

        page.scroll_to(page.page_height());
        page.nudge();
        TimeoutFuture::new(config.base_tick_ms).await;

        attempts += 1;
        if attempts > config.max_attempts {
            break;
        }

        let height = page.page_height();
        if let crate::session::HeightTrend::Unchanged(count) = stall.observe(height) {
            if count < config.unchanged_threshold {
                continue;
            }
            if !burst_attempted {
                burst_attempted = true;
                page.force_load_burst();
                TimeoutFuture::new(config.recheck_delay_ms).await;
                let rechecked = page.page_height();
                if rechecked > stall.last_height() {
                    stall.reset(rechecked);
                    burst_attempted = false;
                    continue;
                }
            }
            break;
        }
    }

    index.merge_all(&page.tweet_captures(), now());
    match save_index(&url, &index).await {
        Ok(()) => sink.progress(&format!("Indexing complete: {} tweets", index.len())),
        Err(e) => sink.progress(&e),
    }
    end_indexing(&runtime);
}

/// Single-flight guard for the indexing loops.
fn begin_indexing(runtime: &Rc<RefCell<ContentRuntime>>) -> bool {
    let mut rt = runtime.borrow_mut();
    if rt.indexing {
        return false;
    }
    rt.indexing = true;
    true
}

fn end_indexing(runtime: &Rc<RefCell<ContentRuntime>>) {
    runtime.borrow_mut().indexing = false;
}
