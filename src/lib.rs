/// Scroll to End - Chrome extension that auto-scrolls a timeline to its end,
/// finds tweets by text/author, and keeps an offline-searchable index of
/// liked tweets. Built with Rust + WASM + Yew.

mod content;
mod controller;
mod dom;
mod index;
mod matcher;
mod messages;
mod page;
mod query;
mod session;
mod storage;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Initialize the content-script runtime on the timeline page
#[wasm_bindgen]
pub fn start_content() {
    content::init();
}
