/// Scroll session state and termination bookkeeping
///
/// The host timeline is virtualized and loads asynchronously, so "no height
/// change" is ambiguous: it can mean "truly at the end" or "still loading".
/// The session tracks height stagnation across ticks and only concludes
/// end-of-content after a forced-load burst plus a delayed recheck.

/// Search criteria for a session, normalized once at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub text: Option<String>,
    pub author: Option<String>,
}

impl SearchCriteria {
    pub fn new(text: &str, author: &str) -> SearchCriteria {
        let text = text.trim().to_lowercase();
        let author = author.trim().trim_start_matches('@').to_lowercase();
        SearchCriteria {
            text: if text.is_empty() { None } else { Some(text) },
            author: if author.is_empty() { None } else { Some(author) },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.author.is_none()
    }
}

/// Tunable policy for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Tick interval at speed 1.0 when bulk-scrolling.
    pub base_tick_ms: u32,
    /// Floor for the tick interval; rendering needs time to catch up.
    pub min_tick_ms: u32,
    /// Fixed cadence when search criteria are present.
    pub thorough_tick_ms: u32,
    /// Unchanged-height ticks tolerated before the forced-load burst.
    pub unchanged_threshold: u32,
    /// Delay between the burst and the height recheck.
    pub recheck_delay_ms: u32,
    /// Hard ceiling on ticks per session.
    pub max_attempts: u32,
    pub min_speed: f64,
    pub max_speed: f64,
    pub speed_up: f64,
    pub slow_down: f64,
    /// Viewport multiple per jump while searching (overshoot avoidance).
    pub thorough_step: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            base_tick_ms: 300,
            min_tick_ms: 50,
            thorough_tick_ms: 250,
            unchanged_threshold: 5,
            recheck_delay_ms: 2500,
            max_attempts: 300,
            min_speed: 1.0,
            max_speed: 10.0,
            speed_up: 1.2,
            slow_down: 0.8,
            thorough_step: 3.0,
        }
    }
}

impl SessionConfig {
    /// Policy for contexts known to load slowly (e.g. a likes timeline):
    /// tolerate longer stagnation before concluding end-of-content.
    pub fn slow_context() -> SessionConfig {
        SessionConfig {
            unchanged_threshold: 8,
            recheck_delay_ms: 3500,
            ..SessionConfig::default()
        }
    }
}

/// Height trend observed on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightTrend {
    Grew,
    Unchanged(u32),
}

/// Tracks page-height stagnation across ticks. Also reused by the indexer's
/// full pass, which follows the same stall policy.
#[derive(Debug, Clone, PartialEq)]
pub struct StallTracker {
    last_height: f64,
    unchanged_count: u32,
}

impl StallTracker {
    pub fn new(baseline: f64) -> StallTracker {
        StallTracker {
            last_height: baseline,
            unchanged_count: 0,
        }
    }

    pub fn observe(&mut self, height: f64) -> HeightTrend {
        if height > self.last_height {
            self.last_height = height;
            self.unchanged_count = 0;
            HeightTrend::Grew
        } else {
            self.unchanged_count += 1;
            HeightTrend::Unchanged(self.unchanged_count)
        }
    }

    pub fn reset(&mut self, height: f64) {
        self.last_height = height;
        self.unchanged_count = 0;
    }

    pub fn last_height(&self) -> f64 {
        self.last_height
    }

    pub fn unchanged_count(&self) -> u32 {
        self.unchanged_count
    }
}

/// Why a session ended. Every termination path produces one of these;
/// there is no failure path that does not.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    /// Match Engine found the target; carries the match reason.
    Found(String),
    /// Viewport reached the bottom and nothing more loaded.
    ReachedBottom,
    /// Height stagnated mid-page even after a forced-load burst.
    Stalled,
    /// End of content with unsatisfied search criteria.
    NotFound,
    /// Attempts ceiling tripped.
    SafetyLimit,
    /// External stop command.
    Cancelled,
    /// The page navigated away mid-session.
    PageChanged,
}

impl EndReason {
    pub fn message(&self) -> String {
        match self {
            EndReason::Found(reason) => reason.clone(),
            EndReason::ReachedBottom => "Reached bottom of page".to_string(),
            EndReason::Stalled => "No more content loading".to_string(),
            EndReason::NotFound => "Tweet not found - reached end of content".to_string(),
            EndReason::SafetyLimit => "Maximum attempts reached".to_string(),
            EndReason::Cancelled => "Scrolling stopped".to_string(),
            EndReason::PageChanged => "Page changed".to_string(),
        }
    }
}

/// Outcome of the delayed stall recheck.
#[derive(Debug, Clone, PartialEq)]
pub enum RecheckOutcome {
    Resume,
    Ended(EndReason),
}

/// All mutable state for one scrolling run. Created on start, mutated every
/// tick, reset on any terminal transition.
#[derive(Debug, Clone)]
pub struct ScrollSession {
    active: bool,
    criteria: SearchCriteria,
    stall: StallTracker,
    speed: f64,
    speed_adaptive: bool,
    attempts: u32,
    waiting_for_content: bool,
    burst_attempted: bool,
    config: SessionConfig,
}

impl ScrollSession {
    pub fn new(config: SessionConfig) -> ScrollSession {
        ScrollSession {
            active: false,
            criteria: SearchCriteria::default(),
            stall: StallTracker::new(0.0),
            speed: 1.0,
            speed_adaptive: false,
            attempts: 0,
            waiting_for_content: false,
            burst_attempted: false,
            config,
        }
    }

    /// Start a run. Returns false (and changes nothing) if one is already
    /// active: at most one session exists at a time.
    pub fn begin(&mut self, criteria: SearchCriteria, baseline_height: f64) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        // Raw speed only pays off when nothing is being searched for;
        // overshooting can skip past content the matcher never saw.
        self.speed_adaptive = criteria.is_empty();
        self.criteria = criteria;
        self.stall = StallTracker::new(baseline_height);
        self.speed = 1.0;
        self.attempts = 0;
        self.waiting_for_content = false;
        self.burst_attempted = false;
        true
    }

    /// Back to inactive defaults. Idempotent.
    pub fn reset(&mut self) {
        self.active = false;
        self.criteria = SearchCriteria::default();
        self.stall = StallTracker::new(0.0);
        self.speed = 1.0;
        self.speed_adaptive = false;
        self.attempts = 0;
        self.waiting_for_content = false;
        self.burst_attempted = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting_for_content
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Record a tick; trips the safety ceiling if exceeded.
    pub fn note_attempt(&mut self) -> Option<EndReason> {
        self.attempts += 1;
        if self.attempts > self.config.max_attempts {
            Some(EndReason::SafetyLimit)
        } else {
            None
        }
    }

    /// Fold the post-scroll height measurement into stall bookkeeping and,
    /// when bulk-scrolling, the adaptive speed.
    pub fn observe_height(&mut self, height: f64) -> HeightTrend {
        let trend = self.stall.observe(height);
        if self.speed_adaptive {
            self.speed = match trend {
                HeightTrend::Grew => (self.speed * self.config.speed_up).min(self.config.max_speed),
                HeightTrend::Unchanged(_) => {
                    (self.speed * self.config.slow_down).max(self.config.min_speed)
                }
            };
        }
        trend
    }

    pub fn stall_threshold_reached(&self) -> bool {
        self.stall.unchanged_count() >= self.config.unchanged_threshold
    }

    /// Arm the single forced-load burst for the current stall episode and
    /// raise the single-flight guard. Returns false if a burst is already
    /// pending or spent.
    pub fn arm_burst(&mut self) -> bool {
        if self.burst_attempted || self.waiting_for_content {
            return false;
        }
        self.burst_attempted = true;
        self.waiting_for_content = true;
        true
    }

    /// Resolve the delayed recheck after a burst. Either the page grew and
    /// the run resumes, or this is the end of content.
    pub fn resolve_recheck(&mut self, height: f64, at_bottom: bool) -> RecheckOutcome {
        self.waiting_for_content = false;
        if height > self.stall.last_height() {
            self.stall.reset(height);
            self.burst_attempted = false;
            return RecheckOutcome::Resume;
        }
        let reason = if !self.criteria.is_empty() {
            EndReason::NotFound
        } else if at_bottom {
            EndReason::ReachedBottom
        } else {
            EndReason::Stalled
        };
        RecheckOutcome::Ended(reason)
    }

    /// Current tick interval: fixed thorough cadence while searching,
    /// otherwise base interval shortened by the adaptive speed.
    pub fn tick_interval_ms(&self) -> u32 {
        if !self.criteria.is_empty() {
            return self.config.thorough_tick_ms;
        }
        let interval = self.config.base_tick_ms as f64 / self.speed;
        interval.max(self.config.min_tick_ms as f64) as u32
    }

    /// Where this tick should scroll to. Bulk-scrolling jumps straight to
    /// the maximum extent (the only reliable trigger for virtualized
    /// rendering); with criteria present the jump is bounded so matching
    /// content cannot be skipped past unrendered.
    pub fn scroll_target(&self, page_height: f64, viewport: f64, scroll_top: f64) -> f64 {
        if self.criteria.is_empty() {
            page_height
        } else {
            (scroll_top + viewport * self.config.thorough_step).min(page_height)
        }
    }
}
