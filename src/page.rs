/// Capability seams over the host page
///
/// The live DOM is external, mutable, and eventually consistent. Everything
/// the controller and indexer need from it goes through these traits so the
/// core stays testable against fakes.

/// Matcher-facing projection of one rendered tweet, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TweetView {
    /// Text sources, best-effort: rendered visible text, full underlying
    /// text, primary content region text. May overlap; the matcher dedupes.
    pub texts: Vec<String>,
    /// Paths of every link inside the item (e.g. "/alice/status/123").
    pub link_paths: Vec<String>,
    /// aria-label and user-identifying attribute values.
    pub aria_labels: Vec<String>,
    /// Short inline text nodes that look like handles ("@alice" or "alice").
    pub inline_handles: Vec<String>,
}

/// Indexer-facing raw extraction of one rendered tweet. Fields are optional
/// where the markup gives no guarantee; extraction failures skip the item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TweetCapture {
    pub permalink: Option<String>,
    pub text: String,
    pub author: Option<String>,
    pub has_video: bool,
    pub has_image: bool,
    pub has_link: bool,
}

/// Read-only accessor over the rendered document.
pub trait PageInspector {
    fn page_height(&self) -> f64;
    fn viewport_height(&self) -> f64;
    fn scroll_top(&self) -> f64;
    fn tweet_count(&self) -> usize;
    fn tweet_views(&self) -> Vec<TweetView>;
    fn tweet_captures(&self) -> Vec<TweetCapture>;
    fn current_url(&self) -> String;

    /// Whether the viewport sits at (or within a small slack of) the
    /// maximum scroll extent.
    fn at_bottom(&self) -> bool {
        self.scroll_top() + self.viewport_height() >= self.page_height() - 100.0
    }
}

/// Best-effort, idempotent perturbations that coax the page into rendering
/// more content. None may assume success, and none may navigate: clicking
/// content items or "show more" controls is forbidden.
pub trait ContentLoader {
    /// Command the viewport to an absolute vertical offset.
    fn scroll_to(&self, y: f64);
    /// One pass of lazy-load coaxing (synthetic events, lazy media, jiggle).
    fn nudge(&self);
    /// Aggressive variant used once per stall episode.
    fn force_load_burst(&self);
    /// Center the matched item in the viewport and highlight it briefly.
    fn reveal(&self, index: usize);
}

/// Push side of the command channel.
pub trait EventSink {
    fn progress(&self, message: &str);
    fn complete(&self, reason: &crate::session::EndReason);
}
