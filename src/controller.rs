/// Scroll Controller: owns the session and drives the tick loop
///
/// The controller is synchronous and generic over the page capabilities and
/// the event sink; timers live in the content runtime, which turns each
/// `TickOutcome` into the next scheduled continuation. Host-page interaction
/// failures never surface as errors here: a query that returns nothing or a
/// scroll with no effect is just "no progress this tick" and feeds the stall
/// counters.

use crate::matcher;
use crate::page::{ContentLoader, EventSink, PageInspector};
use crate::session::{
    EndReason, HeightTrend, RecheckOutcome, ScrollSession, SearchCriteria, SessionConfig,
};

/// What the runtime should do after a tick body ran.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing to do (inactive, or a recheck is already in flight).
    Idle,
    /// Schedule the next tick.
    Continue { next_tick_ms: u32 },
    /// A forced-load burst was issued; schedule the delayed recheck and do
    /// not tick until it resolves.
    AwaitRecheck { delay_ms: u32 },
    /// The session ended; all pending continuations are stale.
    Finished,
}

pub struct ScrollController<P, S> {
    session: ScrollSession,
    page: P,
    sink: S,
}

impl<P, S> ScrollController<P, S>
where
    P: PageInspector + ContentLoader,
    S: EventSink,
{
    pub fn new(page: P, sink: S, config: SessionConfig) -> ScrollController<P, S> {
        ScrollController {
            session: ScrollSession::new(config),
            page,
            sink,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Begin a run. Returns the delay until the first tick, or None if a
    /// session is already active (the start is then a no-op).
    pub fn start(&mut self, criteria: SearchCriteria) -> Option<u32> {
        let baseline = self.page.page_height();
        if !self.session.begin(criteria, baseline) {
            return None;
        }
        log::info!(
            "scroll session started (criteria: {:?})",
            self.session.criteria()
        );
        self.sink.progress("Starting...");
        Some(self.session.tick_interval_ms())
    }

    /// External stop. Always wins immediately; a no-op when idle.
    pub fn stop(&mut self) {
        if !self.session.is_active() {
            return;
        }
        self.finish(EndReason::Cancelled);
    }

    /// The page navigated in place while running.
    pub fn handle_navigation(&mut self) {
        if !self.session.is_active() {
            return;
        }
        self.finish(EndReason::PageChanged);
    }

    /// One tick of the loop: match check, jump, coax, height compare,
    /// stall/safety bookkeeping.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.session.is_active() || self.session.is_waiting() {
            return TickOutcome::Idle;
        }

        if !self.session.criteria().is_empty() {
            let views = self.page.tweet_views();
            if let Some(found) = matcher::find_match(&views, self.session.criteria()) {
                self.page.reveal(found.index);
                self.finish(EndReason::Found(found.reason));
                return TickOutcome::Finished;
            }
        }

        let target = self.session.scroll_target(
            self.page.page_height(),
            self.page.viewport_height(),
            self.page.scroll_top(),
        );
        self.page.scroll_to(target);
        self.page.nudge();

        let height = self.page.page_height();
        let trend = self.session.observe_height(height);

        if let Some(reason) = self.session.note_attempt() {
            self.finish(reason);
            return TickOutcome::Finished;
        }

        if let HeightTrend::Unchanged(_) = trend {
            if self.session.stall_threshold_reached() && self.session.arm_burst() {
                self.page.force_load_burst();
                self.sink.progress("Checking for more content...");
                return TickOutcome::AwaitRecheck {
                    delay_ms: self.session.config().recheck_delay_ms,
                };
            }
        }

        self.sink.progress(&self.progress_message());
        TickOutcome::Continue {
            next_tick_ms: self.session.tick_interval_ms(),
        }
    }

    /// Delayed recheck after a forced-load burst. Runs as a scheduled
    /// continuation; if the session was stopped in the meantime this is a
    /// no-op.
    pub fn recheck(&mut self) -> TickOutcome {
        if !self.session.is_active() {
            return TickOutcome::Idle;
        }
        let height = self.page.page_height();
        let at_bottom = self.page.at_bottom();
        match self.session.resolve_recheck(height, at_bottom) {
            RecheckOutcome::Resume => TickOutcome::Continue {
                next_tick_ms: self.session.tick_interval_ms(),
            },
            RecheckOutcome::Ended(reason) => {
                self.finish(reason);
                TickOutcome::Finished
            }
        }
    }

    fn finish(&mut self, reason: EndReason) {
        log::info!("scroll session ended: {}", reason.message());
        self.sink.complete(&reason);
        self.session.reset();
    }

    fn progress_message(&self) -> String {
        let height = self.page.page_height();
        let viewport = self.page.viewport_height();
        let top = self.page.scroll_top();
        let span = (height - viewport).max(1.0);
        let percent = ((top / span) * 100.0).round().min(99.0) as u32;
        format!("{}% - Attempt {}", percent, self.session.attempts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{TweetCapture, TweetView};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Simulated page: grows by `growth_per_scroll` on every scroll command
    /// until `max_height`, then stalls.
    struct FakePage {
        height: Cell<f64>,
        max_height: f64,
        growth_per_scroll: f64,
        viewport: f64,
        scroll_top: Cell<f64>,
        views: RefCell<Vec<TweetView>>,
        revealed: Cell<Option<usize>>,
        bursts: Cell<u32>,
    }

    impl FakePage {
        fn growing(start: f64, growth: f64, max: f64) -> FakePage {
            FakePage {
                height: Cell::new(start),
                max_height: max,
                growth_per_scroll: growth,
                viewport: 800.0,
                scroll_top: Cell::new(0.0),
                views: RefCell::new(Vec::new()),
                revealed: Cell::new(None),
                bursts: Cell::new(0),
            }
        }

        fn stuck(height: f64) -> FakePage {
            FakePage::growing(height, 0.0, height)
        }

        fn with_views(self, views: Vec<TweetView>) -> FakePage {
            *self.views.borrow_mut() = views;
            self
        }
    }

    impl PageInspector for FakePage {
        fn page_height(&self) -> f64 {
            self.height.get()
        }
        fn viewport_height(&self) -> f64 {
            self.viewport
        }
        fn scroll_top(&self) -> f64 {
            self.scroll_top.get()
        }
        fn tweet_count(&self) -> usize {
            self.views.borrow().len()
        }
        fn tweet_views(&self) -> Vec<TweetView> {
            self.views.borrow().clone()
        }
        fn tweet_captures(&self) -> Vec<TweetCapture> {
            Vec::new()
        }
        fn current_url(&self) -> String {
            "https://x.com/alice/likes".to_string()
        }
    }

    impl ContentLoader for FakePage {
        fn scroll_to(&self, y: f64) {
            let max_top = (self.height.get() - self.viewport).max(0.0);
            self.scroll_top.set(y.min(max_top));
            let next = (self.height.get() + self.growth_per_scroll).min(self.max_height);
            self.height.set(next);
        }
        fn nudge(&self) {}
        fn force_load_burst(&self) {
            self.bursts.set(self.bursts.get() + 1);
        }
        fn reveal(&self, index: usize) {
            self.revealed.set(Some(index));
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        completions: Rc<RefCell<Vec<String>>>,
    }

    impl EventSink for RecordingSink {
        fn progress(&self, _message: &str) {}
        fn complete(&self, reason: &EndReason) {
            self.completions.borrow_mut().push(reason.message());
        }
    }

    fn controller(page: FakePage) -> (ScrollController<FakePage, RecordingSink>, RecordingSink) {
        let sink = RecordingSink::default();
        (
            ScrollController::new(page, sink.clone(), SessionConfig::default()),
            sink,
        )
    }

    /// Drive ticks and rechecks the way the runtime would, up to `limit`
    /// scheduled continuations.
    fn run_to_completion(
        ctrl: &mut ScrollController<FakePage, RecordingSink>,
        limit: usize,
    ) -> usize {
        let mut steps = 0;
        while steps < limit {
            steps += 1;
            match ctrl.tick() {
                TickOutcome::Continue { .. } => {}
                TickOutcome::AwaitRecheck { .. } => match ctrl.recheck() {
                    TickOutcome::Finished => return steps,
                    _ => {}
                },
                TickOutcome::Finished | TickOutcome::Idle => return steps,
            }
        }
        steps
    }

    #[test]
    fn test_start_is_rejected_while_running() {
        let (mut ctrl, _) = controller(FakePage::growing(1000.0, 200.0, 100_000.0));
        assert!(ctrl.start(SearchCriteria::default()).is_some());
        assert!(ctrl.start(SearchCriteria::new("other", "")).is_none());
        assert!(ctrl.is_active());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut ctrl, sink) = controller(FakePage::stuck(1000.0));
        ctrl.stop();
        assert!(sink.completions.borrow().is_empty());

        ctrl.start(SearchCriteria::default());
        ctrl.stop();
        ctrl.stop();
        assert_eq!(*sink.completions.borrow(), vec!["Scrolling stopped"]);
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_stall_detection_window() {
        let (mut ctrl, sink) = controller(FakePage::stuck(1000.0));
        ctrl.start(SearchCriteria::default());

        let threshold = SessionConfig::default().unchanged_threshold as usize;
        // Not before the threshold...
        for tick in 1..threshold {
            assert_eq!(
                ctrl.tick(),
                TickOutcome::Continue {
                    next_tick_ms: ctrl.session.tick_interval_ms()
                },
                "tick {tick} ended early"
            );
        }
        // ...and exactly at it, the burst-and-recheck fires.
        assert!(matches!(ctrl.tick(), TickOutcome::AwaitRecheck { .. }));
        assert_eq!(ctrl.page().bursts.get(), 1);

        // Height still stuck after the burst: end of content. The fake page
        // is scrolled to its maximum extent, so this reads as the bottom.
        assert_eq!(ctrl.recheck(), TickOutcome::Finished);
        assert_eq!(*sink.completions.borrow(), vec!["Reached bottom of page"]);
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_stall_recheck_resumes_when_content_arrives() {
        let page = FakePage::stuck(1000.0);
        let (mut ctrl, sink) = controller(page);
        ctrl.start(SearchCriteria::default());
        let threshold = SessionConfig::default().unchanged_threshold as usize;
        for _ in 0..threshold - 1 {
            ctrl.tick();
        }
        assert!(matches!(ctrl.tick(), TickOutcome::AwaitRecheck { .. }));

        // Content arrives while waiting.
        ctrl.page.height.set(1600.0);
        assert!(matches!(ctrl.recheck(), TickOutcome::Continue { .. }));
        assert!(ctrl.is_active());
        assert!(sink.completions.borrow().is_empty());
    }

    #[test]
    fn test_stall_with_criteria_reports_not_found() {
        let (mut ctrl, sink) = controller(FakePage::stuck(1000.0));
        ctrl.start(SearchCriteria::new("needle", ""));
        run_to_completion(&mut ctrl, 50);
        assert_eq!(
            *sink.completions.borrow(),
            vec!["Tweet not found - reached end of content"]
        );
    }

    #[test]
    fn test_safety_limit_on_ever_growing_page() {
        // Content loads forever; the attempts ceiling must still terminate.
        let (mut ctrl, sink) = controller(FakePage::growing(1000.0, 500.0, f64::MAX));
        ctrl.start(SearchCriteria::default());
        let steps = run_to_completion(&mut ctrl, 10_000);
        assert_eq!(steps as u32, SessionConfig::default().max_attempts + 1);
        assert_eq!(*sink.completions.borrow(), vec!["Maximum attempts reached"]);
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_navigation_interrupts_session() {
        let (mut ctrl, sink) = controller(FakePage::growing(1000.0, 200.0, f64::MAX));
        ctrl.start(SearchCriteria::default());
        ctrl.tick();
        ctrl.handle_navigation();
        assert_eq!(*sink.completions.borrow(), vec!["Page changed"]);
        assert!(!ctrl.is_active());

        // Not running: nothing further to interrupt.
        ctrl.handle_navigation();
        assert_eq!(sink.completions.borrow().len(), 1);
    }

    #[test]
    fn test_match_terminates_and_reveals() {
        let views = vec![
            TweetView {
                texts: vec!["unrelated".to_string()],
                ..TweetView::default()
            },
            TweetView {
                texts: vec!["the exact needle text".to_string()],
                link_paths: vec!["/alice/status/42".to_string()],
                ..TweetView::default()
            },
        ];
        let page = FakePage::stuck(5000.0).with_views(views);
        let (mut ctrl, sink) = controller(page);
        ctrl.start(SearchCriteria::new("needle", "alice"));
        assert_eq!(ctrl.tick(), TickOutcome::Finished);
        assert_eq!(ctrl.page().revealed.get(), Some(1));
        assert_eq!(
            *sink.completions.borrow(),
            vec!["Found tweet matching \"needle\" from @alice"]
        );
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_recheck_after_stop_is_noop() {
        let (mut ctrl, sink) = controller(FakePage::stuck(1000.0));
        ctrl.start(SearchCriteria::default());
        let threshold = SessionConfig::default().unchanged_threshold as usize;
        for _ in 0..threshold - 1 {
            ctrl.tick();
        }
        assert!(matches!(ctrl.tick(), TickOutcome::AwaitRecheck { .. }));

        // Stop lands before the queued recheck runs; the recheck must be a
        // guarded no-op, not a second termination.
        ctrl.stop();
        assert_eq!(ctrl.recheck(), TickOutcome::Idle);
        assert_eq!(*sink.completions.borrow(), vec!["Scrolling stopped"]);
    }

    #[test]
    fn test_tick_skipped_while_waiting() {
        let (mut ctrl, _) = controller(FakePage::stuck(1000.0));
        ctrl.start(SearchCriteria::default());
        let threshold = SessionConfig::default().unchanged_threshold as usize;
        for _ in 0..threshold - 1 {
            ctrl.tick();
        }
        assert!(matches!(ctrl.tick(), TickOutcome::AwaitRecheck { .. }));
        // A tick that fires while the recheck is pending does no work.
        assert_eq!(ctrl.tick(), TickOutcome::Idle);
        assert_eq!(ctrl.page().bursts.get(), 1);
    }
}
