/// Page Inspector / Content Loader over the live document
///
/// Every query here is best-effort: the timeline is virtualized and mutates
/// underneath us, so a missing element or a failed call degrades to a
/// default value, never an error. The loader side perturbs rendering state
/// only; it never clicks content items or "show more" controls, since their
/// handlers navigate or open modals and would corrupt the session.

use crate::page::{ContentLoader, PageInspector, TweetCapture, TweetView};
use gloo_timers::callback::Timeout;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Event, HtmlElement, Window};

const TWEET_SELECTOR: &str = "article[data-testid=\"tweet\"]";
const TWEET_TEXT_SELECTOR: &str = "[data-testid=\"tweetText\"]";
const USER_NAME_SELECTOR: &str = "[data-testid=\"User-Name\"]";
const PHOTO_SELECTOR: &str = "[data-testid=\"tweetPhoto\"], img[src*=\"/media/\"]";
const VIDEO_SELECTOR: &str = "[data-testid=\"videoPlayer\"], video";
const CARD_SELECTOR: &str = "[data-testid=\"card.wrapper\"]";
const HIGHLIGHT_MS: u32 = 8000;

#[derive(Clone, Copy, Default)]
pub struct DomPage;

impl DomPage {
    pub fn new() -> DomPage {
        DomPage
    }

    fn window(&self) -> Option<Window> {
        web_sys::window()
    }

    fn document(&self) -> Option<Document> {
        self.window()?.document()
    }

    fn tweet_elements(&self) -> Vec<Element> {
        let Some(document) = self.document() else {
            return Vec::new();
        };
        let Ok(nodes) = document.query_selector_all(TWEET_SELECTOR) else {
            return Vec::new();
        };
        let mut elements = Vec::with_capacity(nodes.length() as usize);
        for i in 0..nodes.length() {
            if let Some(element) = nodes.get(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                elements.push(element);
            }
        }
        elements
    }

    fn dispatch_window_event(&self, name: &str) {
        if let Some(window) = self.window() {
            if let Ok(event) = Event::new(name) {
                let _ = window.dispatch_event(&event);
            }
        }
    }

    /// Rewrite deferred-source attributes so lazily rendered media loads
    /// without ever entering the viewport.
    fn promote_lazy_media(&self) {
        let Some(document) = self.document() else {
            return;
        };
        if let Ok(nodes) = document.query_selector_all("img[data-src], img[loading=\"lazy\"]") {
            for i in 0..nodes.length() {
                let Some(img) = nodes.get(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                    continue;
                };
                if let Some(src) = img.get_attribute("data-src") {
                    let _ = img.set_attribute("src", &src);
                }
                let _ = img.set_attribute("loading", "eager");
            }
        }
    }

    /// Small oscillation around the current position; intersection
    /// observers often need the viewport to move, not just sit at an offset.
    fn jiggle(&self) {
        if let Some(window) = self.window() {
            window.scroll_by_with_x_and_y(0.0, -120.0);
            window.scroll_by_with_x_and_y(0.0, 120.0);
        }
        self.dispatch_window_event("scroll");
    }

    /// Momentarily report an enlarged viewport and announce a resize, which
    /// makes responsive re-render logic reconsider what is "visible".
    fn viewport_stretch(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let original = window.inner_height().ok();
        let stretched = JsValue::from_f64(4000.0);
        if js_sys::Reflect::set(window.as_ref(), &JsValue::from_str("innerHeight"), &stretched)
            .is_ok()
        {
            self.dispatch_window_event("resize");
            if let Some(original) = original {
                let _ = js_sys::Reflect::set(
                    window.as_ref(),
                    &JsValue::from_str("innerHeight"),
                    &original,
                );
            }
            self.dispatch_window_event("resize");
        }
    }

    fn view_from_element(&self, element: &Element) -> TweetView {
        let mut texts = Vec::new();
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            texts.push(html.inner_text());
        }
        if let Some(full) = element.text_content() {
            texts.push(full);
        }
        if let Ok(Some(region)) = element.query_selector(TWEET_TEXT_SELECTOR) {
            if let Some(text) = region.text_content() {
                texts.push(text);
            }
        }

        let mut link_paths = Vec::new();
        if let Ok(anchors) = element.query_selector_all("a[href]") {
            for i in 0..anchors.length() {
                let Some(anchor) = anchors.get(i).and_then(|n| n.dyn_into::<Element>().ok())
                else {
                    continue;
                };
                if let Some(href) = anchor.get_attribute("href") {
                    link_paths.push(href_path(&href));
                }
            }
        }

        let mut aria_labels = Vec::new();
        if let Ok(labelled) = element.query_selector_all("[aria-label]") {
            for i in 0..labelled.length() {
                let Some(el) = labelled.get(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                    continue;
                };
                if let Some(label) = el.get_attribute("aria-label") {
                    aria_labels.push(label);
                }
            }
        }
        if let Some(own) = element.get_attribute("aria-label") {
            aria_labels.push(own);
        }

        let mut inline_handles = Vec::new();
        if let Ok(spans) = element.query_selector_all("span") {
            for i in 0..spans.length() {
                let Some(span) = spans.get(i) else { continue };
                let Some(text) = span.text_content() else { continue };
                let text = text.trim().to_string();
                if !text.is_empty() && text.len() <= 32 && text.starts_with('@') {
                    inline_handles.push(text);
                }
            }
        }

        TweetView {
            texts,
            link_paths,
            aria_labels,
            inline_handles,
        }
    }

    fn capture_from_element(&self, element: &Element) -> TweetCapture {
        let permalink = element
            .query_selector("a[href*=\"/status/\"]")
            .ok()
            .flatten()
            .and_then(|a| a.get_attribute("href"));

        let text = element
            .query_selector(TWEET_TEXT_SELECTOR)
            .ok()
            .flatten()
            .and_then(|region| region.text_content())
            .or_else(|| element.text_content())
            .unwrap_or_default();

        // Handle shown in the byline, e.g. "Alice @alice · 2h".
        let author = element
            .query_selector(USER_NAME_SELECTOR)
            .ok()
            .flatten()
            .and_then(|name| name.text_content())
            .and_then(|text| handle_from_byline(&text));

        let has = |selector: &str| {
            element
                .query_selector(selector)
                .ok()
                .flatten()
                .is_some()
        };

        TweetCapture {
            permalink,
            text,
            author,
            has_video: has(VIDEO_SELECTOR),
            has_image: has(PHOTO_SELECTOR),
            has_link: has(CARD_SELECTOR),
        }
    }
}

impl PageInspector for DomPage {
    fn page_height(&self) -> f64 {
        self.document()
            .and_then(|d| d.body())
            .map(|b| b.scroll_height() as f64)
            .unwrap_or(0.0)
    }

    fn viewport_height(&self) -> f64 {
        self.window()
            .and_then(|w| w.inner_height().ok())
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    fn scroll_top(&self) -> f64 {
        self.window()
            .and_then(|w| w.page_y_offset().ok())
            .unwrap_or(0.0)
    }

    fn tweet_count(&self) -> usize {
        self.tweet_elements().len()
    }

    fn tweet_views(&self) -> Vec<TweetView> {
        self.tweet_elements()
            .iter()
            .map(|e| self.view_from_element(e))
            .collect()
    }

    fn tweet_captures(&self) -> Vec<TweetCapture> {
        self.tweet_elements()
            .iter()
            .map(|e| self.capture_from_element(e))
            .collect()
    }

    fn current_url(&self) -> String {
        self.window()
            .map(|w| w.location())
            .and_then(|l| l.href().ok())
            .unwrap_or_default()
    }
}

impl ContentLoader for DomPage {
    fn scroll_to(&self, y: f64) {
        if let Some(window) = self.window() {
            window.scroll_to_with_x_and_y(0.0, y);
        }
        self.dispatch_window_event("scroll");
    }

    fn nudge(&self) {
        self.dispatch_window_event("scroll");
        self.promote_lazy_media();
        self.jiggle();
    }

    fn force_load_burst(&self) {
        for _ in 0..3 {
            self.promote_lazy_media();
            self.viewport_stretch();
            self.jiggle();
        }
        log::debug!("forced-load burst issued");
    }

    fn reveal(&self, index: usize) {
        let elements = self.tweet_elements();
        let Some(element) = elements.get(index) else {
            return;
        };
        let Some(window) = self.window() else {
            return;
        };

        // Center the item manually; scrollIntoView is avoided because the
        // host page hooks it for its own navigation behaviors.
        let rect = element.get_bounding_client_rect();
        let absolute_top = rect.top() + self.scroll_top();
        let target = (absolute_top - (self.viewport_height() - rect.height()) / 2.0).max(0.0);
        window.scroll_to_with_x_and_y(0.0, target);

        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            let style = html.style();
            let _ = style.set_property("border", "3px solid #1da1f2");
            let _ = style.set_property("border-radius", "10px");

            let element = element.clone();
            Timeout::new(HIGHLIGHT_MS, move || {
                if let Some(html) = element.dyn_ref::<HtmlElement>() {
                    let style = html.style();
                    let _ = style.remove_property("border");
                    let _ = style.remove_property("border-radius");
                }
            })
            .forget();
        }
    }
}

/// Path component of an href that may be relative or absolute.
fn href_path(href: &str) -> String {
    if href.starts_with('/') {
        return href.to_string();
    }
    url::Url::parse(href)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Pull the "@handle" token out of byline text.
fn handle_from_byline(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.len() > 1 && token.starts_with('@'))
        .map(|token| token.trim_start_matches('@').to_lowercase())
}
