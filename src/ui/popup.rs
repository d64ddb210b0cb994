/// Popup UI for the Scroll to End extension

use crate::index::{IndexedTweet, TweetIndex};
use crate::messages::{PushEvent, Request};
use crate::{query, storage};
use patternfly_yew::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/js/popup_bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn sendToActiveTab(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getActiveTabUrl() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSyncStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setSyncStorage(value: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getAllLocalStorage() -> Result<JsValue, JsValue>;

    fn onRuntimeEvent(handler: &js_sys::Function);

    #[wasm_bindgen(catch)]
    async fn openUrl(url: &str) -> Result<(), JsValue>;
}

#[derive(Clone, PartialEq)]
enum ActiveTab {
    Search,
    Scroll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SavedInputs {
    search_text: Option<String>,
    username_text: Option<String>,
}

#[derive(Clone, PartialEq, Default)]
struct IndexStats {
    total_tweets: usize,
    total_accounts: usize,
    last_updated: Option<f64>,
}

#[function_component(App)]
pub fn app() -> Html {
    let active_tab = use_state(|| ActiveTab::Scroll);
    let status = use_state(String::new);
    let scrolling = use_state(|| false);
    let search_text = use_state(String::new);
    let username_text = use_state(String::new);
    let index_query = use_state(String::new);
    let indices = use_state(Vec::<TweetIndex>::new);

    // Restore saved inputs and ask the page whether a session is running.
    {
        let search_text = search_text.clone();
        let username_text = username_text.clone();
        let status = status.clone();
        let scrolling = scrolling.clone();
        let indices = indices.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                if let Ok(saved) = load_saved_inputs().await {
                    if let Some(text) = saved.search_text {
                        search_text.set(text);
                    }
                    if let Some(user) = saved.username_text {
                        username_text.set(user);
                    }
                }

                match request_status().await {
                    Ok(true) => {
                        scrolling.set(true);
                        status.set("Scrolling in progress...".to_string());
                    }
                    Ok(false) => {}
                    Err(_) => {
                        status.set("Please navigate to Twitter/X likes page".to_string());
                    }
                }

                if let Ok(loaded) = load_indices().await {
                    indices.set(loaded);
                }
            });
            || ()
        });
    }

    // Push events from the running session drive the status line.
    {
        let status = status.clone();
        let scrolling = scrolling.clone();
        use_effect_with((), move |_| {
            let listener = Closure::wrap(Box::new(move |event: JsValue| {
                match serde_wasm_bindgen::from_value::<PushEvent>(event) {
                    Ok(PushEvent::ScrollProgress { progress }) => {
                        status.set(format!("Scrolling... {}", progress));
                    }
                    Ok(PushEvent::ScrollComplete { reason }) => {
                        scrolling.set(false);
                        status.set(reason);
                    }
                    Err(_) => {}
                }
            }) as Box<dyn FnMut(JsValue)>);
            onRuntimeEvent(listener.as_ref().unchecked_ref());
            listener.forget();
            || ()
        });
    }

    let on_tab_click = {
        let active_tab = active_tab.clone();
        let indices = indices.clone();
        move |tab: ActiveTab| {
            let active_tab = active_tab.clone();
            let indices = indices.clone();
            Callback::from(move |_| {
                if tab == ActiveTab::Search {
                    let indices = indices.clone();
                    spawn_local(async move {
                        if let Ok(loaded) = load_indices().await {
                            indices.set(loaded);
                        }
                    });
                }
                active_tab.set(tab.clone());
            })
        }
    };

    let on_search_text_input = {
        let search_text = search_text.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let value = input.value();
                search_text.set(value.clone());
                spawn_local(async move {
                    let _ = persist_input("searchText", &value).await;
                });
            }
        })
    };

    let on_username_input = {
        let username_text = username_text.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let value = input.value();
                username_text.set(value.clone());
                spawn_local(async move {
                    let _ = persist_input("usernameText", &value).await;
                });
            }
        })
    };

    let on_index_query_input = {
        let index_query = index_query.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                index_query.set(input.value());
            }
        })
    };

    let on_start = {
        let status = status.clone();
        let scrolling = scrolling.clone();
        let search_text = search_text.clone();
        let username_text = username_text.clone();

        Callback::from(move |_| {
            let status = status.clone();
            let scrolling = scrolling.clone();
            let request = Request::StartScroll {
                search_text: (*search_text).clone(),
                username: (*username_text).clone(),
            };
            let summary = start_summary(&search_text, &username_text);

            spawn_local(async move {
                if !on_supported_page().await {
                    status.set("Please navigate to Twitter/X first".to_string());
                    return;
                }
                match send_request(&request).await {
                    Ok(_) => {
                        scrolling.set(true);
                        status.set(summary);
                    }
                    Err(_) => {
                        status.set("Error: Please refresh the page".to_string());
                    }
                }
            });
        })
    };

    let on_stop = {
        let status = status.clone();
        let scrolling = scrolling.clone();
        Callback::from(move |_| {
            let status = status.clone();
            let scrolling = scrolling.clone();
            spawn_local(async move {
                let _ = send_request(&Request::StopScroll).await;
                scrolling.set(false);
                status.set("Scrolling stopped".to_string());
            });
        })
    };

    let on_jump = simple_command(
        status.clone(),
        Request::JumpToBottom,
        "Jumping to bottom...",
    );
    let on_force_load = simple_command(
        status.clone(),
        Request::ForceLoad,
        "Forcing content load...",
    );

    let on_reindex = {
        let status = status.clone();
        Callback::from(move |_| {
            let status = status.clone();
            let confirmed = web_sys::window()
                .and_then(|w| {
                    w.confirm_with_message(
                        "Reindex all tweets? This deletes the current index and rebuilds \
                         it from scratch. This may take several minutes.",
                    )
                    .ok()
                })
                .unwrap_or(false);
            if !confirmed {
                return;
            }
            spawn_local(async move {
                let url = active_tab_url().await;
                if !url.contains("/likes") {
                    status.set("Please navigate to a likes page first".to_string());
                    return;
                }
                match send_request(&Request::ReindexAll).await {
                    Ok(_) => status.set("Starting reindex...".to_string()),
                    Err(_) => status.set("Error: Please refresh the page".to_string()),
                }
            });
        })
    };

    let start_label = if search_text.is_empty() && username_text.is_empty() {
        "Scroll to Bottom"
    } else {
        "Find Tweet"
    };

    let stats = compute_stats(&indices);
    let results = if index_query.trim().is_empty() {
        Vec::new()
    } else {
        search_all_indices(&indices, &index_query)
    };

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Scroll to End"}</h1>

            // Tab navigation
            <div class="pf-v5-c-tabs tabs-nav">
                <ul class="pf-v5-c-tabs__list">
                    <li class={if *active_tab == ActiveTab::Search { "pf-v5-c-tabs__item pf-m-current" } else { "pf-v5-c-tabs__item" }}>
                        <button
                            class="pf-v5-c-tabs__link"
                            onclick={on_tab_click(ActiveTab::Search)}
                        >
                            <span class="pf-v5-c-tabs__item-text">{"Search"}</span>
                        </button>
                    </li>
                    <li class={if *active_tab == ActiveTab::Scroll { "pf-v5-c-tabs__item pf-m-current" } else { "pf-v5-c-tabs__item" }}>
                        <button
                            class="pf-v5-c-tabs__link"
                            onclick={on_tab_click(ActiveTab::Scroll)}
                        >
                            <span class="pf-v5-c-tabs__item-text">{"Scroll"}</span>
                        </button>
                    </li>
                </ul>
            </div>

            // Status line
            if !status.is_empty() {
                <Alert r#type={AlertType::Info} title={(*status).clone()} inline={true}>
                </Alert>
            }

            <div class="tab-pane-content">
                {match &*active_tab {
                    ActiveTab::Scroll => html! {
                        <div class="flex-column-gap">
                            <input
                                type="text"
                                class="criteria-input"
                                placeholder="Tweet text to find (optional)"
                                value={(*search_text).clone()}
                                oninput={on_search_text_input}
                            />
                            <input
                                type="text"
                                class="criteria-input"
                                placeholder="Author handle (optional)"
                                value={(*username_text).clone()}
                                oninput={on_username_input}
                            />

                            if *scrolling {
                                <Button onclick={on_stop} variant={ButtonVariant::Danger} block={true}>
                                    {"Stop"}
                                </Button>
                            } else {
                                <Button onclick={on_start} variant={ButtonVariant::Primary} block={true}>
                                    {start_label}
                                </Button>
                            }

                            <Button onclick={on_jump} disabled={*scrolling} variant={ButtonVariant::Secondary} block={true}>
                                {"Jump to Bottom"}
                            </Button>
                            <Button onclick={on_force_load} disabled={*scrolling} variant={ButtonVariant::Secondary} block={true}>
                                {"Force Load Content"}
                            </Button>
                            <Button onclick={on_reindex} disabled={*scrolling} variant={ButtonVariant::Secondary} block={true}>
                                {"Reindex All Tweets"}
                            </Button>
                        </div>
                    },
                    ActiveTab::Search => html! {
                        <div class="flex-column-gap">
                            <input
                                type="text"
                                class="criteria-input"
                                placeholder="Search indexed tweets (from:user has:image ...)"
                                value={(*index_query).clone()}
                                oninput={on_index_query_input}
                            />

                            <div class="stats-box">
                                <span class="stat-item">{format!("{} tweets", stats.total_tweets)}</span>
                                <span class="stat-item">{format!("{} accounts", stats.total_accounts)}</span>
                                <span class="stat-item">{last_updated_label(&stats)}</span>
                            </div>

                            if index_query.trim().is_empty() {
                                if stats.total_tweets == 0 {
                                    <p class="search-hint">
                                        {"No tweets indexed yet. Visit a likes page and use the \
                                          Scroll tab to index your liked tweets, then search them \
                                          here even when offline."}
                                    </p>
                                } else {
                                    <p class="search-hint">
                                        {format!("Start typing to search your {} indexed tweets", stats.total_tweets)}
                                    </p>
                                }
                            } else if results.is_empty() {
                                <p class="search-hint">{"No results found"}</p>
                            } else {
                                <SearchResults results={results.clone()} />
                            }
                        </div>
                    },
                }}
            </div>

            <p class="footer-popup">
                {"Scroll to End v0.1.0"}
            </p>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct SearchResultsProps {
    results: Vec<IndexedTweet>,
}

const MAX_RESULTS: usize = 20;

#[function_component(SearchResults)]
fn search_results(props: &SearchResultsProps) -> Html {
    let shown = props.results.iter().take(MAX_RESULTS);

    html! {
        <div class="search-results">
            if props.results.len() > MAX_RESULTS {
                <p class="search-hint">
                    {format!("Showing {} of {} results", MAX_RESULTS, props.results.len())}
                </p>
            }
            {for shown.map(|tweet| {
                let url = tweet.url.clone();
                let onclick = Callback::from(move |_| {
                    let url = url.clone();
                    spawn_local(async move {
                        let _ = openUrl(&url).await;
                    });
                });
                html! {
                    <div class="search-result-item" {onclick}>
                        <div class="search-result-author">{format!("@{}", tweet.author)}</div>
                        <div class="search-result-text">{truncate(&tweet.text, 120)}</div>
                        <div class="search-result-meta">
                            if tweet.has_video { <span>{"\u{1f4f9}"}</span> }
                            if tweet.has_image { <span>{"\u{1f5bc}"}</span> }
                            if tweet.has_link { <span>{"\u{1f517}"}</span> }
                        </div>
                    </div>
                }
            })}
        </div>
    }
}

// Helper functions

fn start_summary(search_text: &str, username: &str) -> String {
    let mut parts = Vec::new();
    if !search_text.trim().is_empty() {
        parts.push(format!("text: \"{}\"", search_text.trim()));
    }
    if !username.trim().is_empty() {
        parts.push(format!("user: {}", username.trim()));
    }
    if parts.is_empty() {
        "Scrolling started...".to_string()
    } else {
        format!("Scrolling... ({})", parts.join(", "))
    }
}

fn simple_command(
    status: UseStateHandle<String>,
    request: Request,
    ack_message: &'static str,
) -> Callback<MouseEvent> {
    Callback::from(move |_| {
        let status = status.clone();
        let request = request.clone();
        spawn_local(async move {
            if !on_supported_page().await {
                status.set("Please navigate to Twitter/X first".to_string());
                return;
            }
            match send_request(&request).await {
                Ok(_) => status.set(ack_message.to_string()),
                Err(_) => status.set("Error: Please refresh the page".to_string()),
            }
        });
    })
}

async fn send_request(request: &Request) -> Result<JsValue, String> {
    let message = request
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize request: {}", e))?;
    sendToActiveTab(message)
        .await
        .map_err(|e| format!("Channel error: {:?}", e))
}

async fn request_status() -> Result<bool, String> {
    let response = send_request(&Request::GetStatus).await?;
    let status: serde_json::Value = serde_wasm_bindgen::from_value(response)
        .map_err(|e| format!("Failed to parse status: {:?}", e))?;
    Ok(status
        .get("isScrolling")
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

async fn active_tab_url() -> String {
    getActiveTabUrl()
        .await
        .ok()
        .and_then(|url| url.as_string())
        .unwrap_or_default()
}

async fn on_supported_page() -> bool {
    let url = active_tab_url().await;
    url.contains("twitter.com") || url.contains("x.com")
}

async fn load_saved_inputs() -> Result<SavedInputs, String> {
    let keys = serde_wasm_bindgen::to_value(&["searchText", "usernameText"])
        .map_err(|e| format!("{}", e))?;
    let saved = getSyncStorage(keys)
        .await
        .map_err(|e| format!("Failed to read saved inputs: {:?}", e))?;
    serde_wasm_bindgen::from_value(saved).map_err(|e| format!("Failed to parse inputs: {}", e))
}

async fn persist_input(key: &str, value: &str) -> Result<(), String> {
    let record = serde_json::json!({ key: value });
    let record = serde_wasm_bindgen::to_value(&record).map_err(|e| format!("{}", e))?;
    setSyncStorage(record)
        .await
        .map_err(|e| format!("Failed to save input: {:?}", e))
}

/// Load every stored index so search works offline, without the content
/// script.
async fn load_indices() -> Result<Vec<TweetIndex>, String> {
    let all = getAllLocalStorage()
        .await
        .map_err(|e| format!("Failed to read storage: {:?}", e))?;
    let all: HashMap<String, serde_json::Value> = serde_wasm_bindgen::from_value(all)
        .map_err(|e| format!("Failed to parse storage: {}", e))?;

    Ok(all
        .into_iter()
        .filter(|(key, _)| key.starts_with(storage::INDEX_KEY_PREFIX))
        .map(|(_, value)| storage::decode_stored_index(Some(value)))
        .collect())
}

fn search_all_indices(indices: &[TweetIndex], query_text: &str) -> Vec<IndexedTweet> {
    let mut results: Vec<IndexedTweet> = indices
        .iter()
        .flat_map(|index| query::search_index(index, query_text))
        .collect();
    results.sort_by(|a, b| {
        b.indexed_at
            .partial_cmp(&a.indexed_at)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

fn compute_stats(indices: &[TweetIndex]) -> IndexStats {
    let total_tweets = indices.iter().map(|i| i.len()).sum();
    let accounts: HashSet<&str> = indices
        .iter()
        .flat_map(|i| i.tweets.values().map(|t| t.author.as_str()))
        .collect();
    let last_updated = indices
        .iter()
        .map(|i| i.last_updated)
        .filter(|t| *t > 0.0)
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));
    IndexStats {
        total_tweets,
        total_accounts: accounts.len(),
        last_updated,
    }
}

fn last_updated_label(stats: &IndexStats) -> String {
    match stats.last_updated {
        Some(timestamp) => {
            let date = js_sys::Date::new(&JsValue::from_f64(timestamp));
            format!(
                "Updated {:04}-{:02}-{:02}",
                date.get_full_year(),
                date.get_month() + 1,
                date.get_date()
            )
        }
        None => "Never indexed".to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
