// MecmLog - app/controller.rs
//
// Interaction controller: turns user actions into filter passes and applies
// their results to the view.
//
// Architecture:
//   - Free-text input is debounced: it arms a deadline and dispatches only
//     once `tick` observes the deadline has passed with no newer input.
//   - Every other action dispatches immediately and disarms the deadline.
//   - Each dispatch gets the next sequence number. A response is applied only
//     when its sequence number is the most recently dispatched one; anything
//     older is discarded on arrival, regardless of arrival order.
//   - Time is passed in by the caller (`now`), so the controller never reads
//     a clock and never blocks.

use crate::app::worker::{FilterRequest, FilterResponse, PassDispatcher};
use crate::core::filter::{FacetSelection, FilterInputs, FilterRow, FilterSpec, SearchMode};
use crate::core::model::{FacetCategory, RowSummary, VisibilityResult};
use crate::core::timestamp;
use crate::util::constants;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A user action the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Search box contents changed (debounced).
    SearchInput(String),
    ClearSearch,
    ToggleRegex,
    ToggleFacet {
        category: FacetCategory,
        value: String,
    },
    /// Reset one facet category to "all".
    ClearFacet(FacetCategory),
    /// Anchor the time window on this timestamp, or clear it when it is
    /// already the anchor.
    ToggleAnchor(String),
    /// Reset search, regex mode, every facet and the anchor.
    ClearAll,
}

/// Tunables for the controller.
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub debounce: Duration,
    pub window_secs: i64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(constants::DEFAULT_FILTER_DEBOUNCE_MS),
            window_secs: constants::DEFAULT_TIME_WINDOW_SECS,
        }
    }
}

pub struct FilterController<D: PassDispatcher> {
    dispatcher: D,
    settings: ControllerSettings,

    inputs: FilterInputs,
    rows: Arc<[FilterRow]>,

    /// Armed by search input; a pass is dispatched once it passes.
    debounce_deadline: Option<Instant>,

    next_seq: u64,
    latest_dispatched: Option<u64>,
    latest_resolved: Option<u64>,
    /// Search mode of the most recent dispatch, adopted when it is applied.
    dispatched_mode: SearchMode,
    /// Most recent spec that compiled; re-applied to a new snapshot while the
    /// current search pattern is invalid.
    last_spec: FilterSpec,

    visibility: Vec<VisibilityResult>,
    summary: RowSummary,
    applied_mode: SearchMode,

    pattern_error: Option<String>,
    pass_failure: Option<String>,
}

impl<D: PassDispatcher> FilterController<D> {
    /// Create a controller showing every row of `rows`. Nothing is dispatched
    /// until the first action.
    pub fn new(dispatcher: D, rows: Arc<[FilterRow]>, settings: ControllerSettings) -> Self {
        let total = rows.len();
        Self {
            dispatcher,
            settings,
            inputs: FilterInputs::default(),
            rows,
            debounce_deadline: None,
            next_seq: 1,
            latest_dispatched: None,
            latest_resolved: None,
            dispatched_mode: SearchMode::Literal,
            last_spec: FilterSpec::show_all(),
            visibility: vec![VisibilityResult::shown(); total],
            summary: RowSummary::all(total),
            applied_mode: SearchMode::Literal,
            pattern_error: None,
            pass_failure: None,
        }
    }

    /// React to one user action.
    pub fn on_event(&mut self, event: ControllerEvent, now: Instant) {
        tracing::trace!(?event, "Controller event");
        match event {
            ControllerEvent::SearchInput(text) => {
                if text != self.inputs.search_text {
                    self.pattern_error = None;
                }
                self.inputs.search_text = text;
                if self.settings.debounce.is_zero() {
                    self.dispatch_now();
                } else {
                    self.debounce_deadline = Some(now + self.settings.debounce);
                }
            }
            ControllerEvent::ClearSearch => {
                self.inputs.search_text.clear();
                self.pattern_error = None;
                self.dispatch_now();
            }
            ControllerEvent::ToggleRegex => {
                self.inputs.mode = self.inputs.mode.toggled();
                self.pattern_error = None;
                self.dispatch_now();
            }
            ControllerEvent::ToggleFacet { category, value } => {
                self.inputs.facets.toggle(category, &value);
                self.dispatch_now();
            }
            ControllerEvent::ClearFacet(category) => {
                self.inputs.facets.clear_category(category);
                self.dispatch_now();
            }
            ControllerEvent::ToggleAnchor(text) => {
                if self.inputs.anchor.as_deref() == Some(text.as_str()) {
                    self.inputs.anchor = None;
                } else {
                    self.inputs.anchor = Some(text);
                }
                self.dispatch_now();
            }
            ControllerEvent::ClearAll => {
                self.inputs = FilterInputs::default();
                self.pattern_error = None;
                self.dispatch_now();
            }
        }
    }

    /// Fire an expired debounce and apply whatever responses have arrived.
    ///
    /// Returns true when the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.debounce_deadline.is_some_and(|deadline| now >= deadline) {
            self.dispatch_now();
        }

        let mut changed = false;
        while let Some(response) = self.dispatcher.try_recv() {
            changed |= self.apply(response);
        }
        changed
    }

    /// Swap in a new row snapshot (sources were added) and re-filter it.
    ///
    /// A pass is always dispatched: when the current search pattern does not
    /// compile, the last spec that did is applied to the new rows and the
    /// pattern error stays up.
    pub fn replace_rows(&mut self, rows: Arc<[FilterRow]>) {
        let total = rows.len();
        self.rows = rows;
        self.visibility = vec![VisibilityResult::shown(); total];
        self.summary = RowSummary::all(total);
        tracing::debug!(rows = total, "Row snapshot replaced");

        self.debounce_deadline = None;
        let spec = match FilterSpec::build(&self.inputs, self.settings.window_secs) {
            Ok(spec) => {
                self.last_spec = spec.clone();
                spec
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search pattern rejected; re-applying last valid filter");
                self.pattern_error = Some(e.to_string());
                self.last_spec.clone()
            }
        };
        self.dispatch(spec);
    }

    fn dispatch_now(&mut self) {
        self.debounce_deadline = None;

        let spec = match FilterSpec::build(&self.inputs, self.settings.window_secs) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(error = %e, "Search pattern rejected; keeping current view");
                self.pattern_error = Some(e.to_string());
                return;
            }
        };
        self.last_spec = spec.clone();
        self.dispatch(spec);
    }

    fn dispatch(&mut self, spec: FilterSpec) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.latest_dispatched = Some(seq);
        self.dispatched_mode = spec.mode();

        tracing::debug!(seq, rows = self.rows.len(), "Dispatching filter pass");
        self.dispatcher.dispatch(FilterRequest {
            seq,
            rows: Arc::clone(&self.rows),
            spec,
        });
    }

    fn apply(&mut self, response: FilterResponse) -> bool {
        let seq = response.seq();
        if Some(seq) != self.latest_dispatched {
            tracing::debug!(seq, latest = ?self.latest_dispatched, "Discarding superseded filter result");
            return false;
        }
        self.latest_resolved = Some(seq);

        match response {
            FilterResponse::Completed { results, .. } => {
                if results.len() != self.rows.len() {
                    tracing::warn!(
                        seq,
                        results = results.len(),
                        rows = self.rows.len(),
                        "Filter result does not match row snapshot; discarded"
                    );
                    return false;
                }
                self.summary = RowSummary::from_results(&results);
                self.visibility = results;
                self.applied_mode = self.dispatched_mode;
                self.pass_failure = None;
                tracing::debug!(seq, summary = %self.summary, "Filter result applied");
                true
            }
            FilterResponse::Failed { reason, .. } => {
                self.pass_failure = Some(reason);
                true
            }
        }
    }

    // -------------------------------------------------------------------------
    // View state
    // -------------------------------------------------------------------------

    /// True while a debounced input is pending or the latest pass has not
    /// been resolved.
    pub fn in_progress(&self) -> bool {
        self.debounce_deadline.is_some() || self.latest_dispatched != self.latest_resolved
    }

    /// When the loop should next call `tick` for the debounce to fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    pub fn inputs(&self) -> &FilterInputs {
        &self.inputs
    }

    pub fn facets(&self) -> &FacetSelection {
        &self.inputs.facets
    }

    pub fn rows(&self) -> &Arc<[FilterRow]> {
        &self.rows
    }

    pub fn visibility(&self) -> &[VisibilityResult] {
        &self.visibility
    }

    /// Indices of currently visible rows.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.visibility
            .iter()
            .enumerate()
            .filter(|(_, r)| r.visible)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn summary(&self) -> RowSummary {
        self.summary
    }

    /// Search mode the applied highlight terms were produced under.
    pub fn highlight_mode(&self) -> SearchMode {
        self.applied_mode
    }

    /// Inline error for a search pattern that does not compile.
    pub fn pattern_error(&self) -> Option<&str> {
        self.pattern_error.as_deref()
    }

    /// Reason the most recent pass failed, until a later pass succeeds.
    pub fn pass_failure(&self) -> Option<&str> {
        self.pass_failure.as_deref()
    }

    /// `"Time Range: HH:MM - HH:MM (centered on HH:MM)"` while an anchor is
    /// set and can be interpreted.
    pub fn time_range_label(&self) -> Option<String> {
        let anchor = timestamp::interpret(self.inputs.anchor.as_deref()?)?;
        Some(timestamp::window_label(anchor, self.settings.window_secs))
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::{execute, snapshot_rows};
    use crate::core::model::{LogEntry, LogType};
    use std::collections::VecDeque;

    /// Dispatcher whose passes complete only when the test says so.
    #[derive(Default)]
    struct ManualDispatcher {
        sent: Vec<FilterRequest>,
        inbox: VecDeque<FilterResponse>,
    }

    impl ManualDispatcher {
        /// Evaluate the request with sequence number `seq` and deliver it.
        fn complete(&mut self, seq: u64) {
            let request = self
                .sent
                .iter()
                .find(|r| r.seq == seq)
                .expect("request was dispatched");
            self.inbox.push_back(FilterResponse::Completed {
                seq,
                results: execute(&request.rows, &request.spec),
            });
        }

        fn fail(&mut self, seq: u64) {
            self.inbox.push_back(FilterResponse::Failed {
                seq,
                reason: "aborted".to_string(),
            });
        }

        fn last_seq(&self) -> u64 {
            self.sent.last().map(|r| r.seq).expect("something was dispatched")
        }
    }

    impl PassDispatcher for ManualDispatcher {
        fn dispatch(&mut self, request: FilterRequest) {
            self.sent.push(request);
        }

        fn try_recv(&mut self) -> Option<FilterResponse> {
            self.inbox.pop_front()
        }
    }

    fn entry(ts: &str, log_type: LogType, message: &str) -> LogEntry {
        LogEntry {
            message: message.to_string(),
            timestamp: ts.to_string(),
            component: "CcmExec".to_string(),
            log_type,
            thread: "1".to_string(),
            source: "CcmExec.log".to_string(),
            line_number: 1,
        }
    }

    fn controller() -> FilterController<ManualDispatcher> {
        let rows = snapshot_rows(&[
            entry("01-15-2024 10:00:00.000+000", LogType::Info, "Disk cleanup failed"),
            entry("01-15-2024 10:01:00.000+000", LogType::Error, "network timeout"),
            entry("01-15-2024 10:10:00.000+000", LogType::Warning, "disk quota"),
        ]);
        FilterController::new(ManualDispatcher::default(), rows, ControllerSettings::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_initial_view_shows_all() {
        let c = controller();
        assert_eq!(c.summary().to_string(), "Showing all 3 rows");
        assert!(!c.in_progress());
        assert!(c.dispatcher().sent.is_empty());
    }

    #[test]
    fn test_search_is_debounced() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(ControllerEvent::SearchInput("d".into()), t0);
        c.on_event(ControllerEvent::SearchInput("di".into()), t0 + ms(100));
        c.on_event(ControllerEvent::SearchInput("disk".into()), t0 + ms(200));
        assert!(c.in_progress());

        c.tick(t0 + ms(450));
        assert!(c.dispatcher().sent.is_empty(), "quiet period not over yet");

        c.tick(t0 + ms(500));
        assert_eq!(c.dispatcher().sent.len(), 1);
        assert_eq!(c.dispatcher().sent[0].spec.search_text(), "disk");
        assert!(c.in_progress());

        c.dispatcher_mut().complete(1);
        assert!(c.tick(t0 + ms(510)));
        assert!(!c.in_progress());
        assert_eq!(c.visible_indices(), vec![0, 2]);
        assert_eq!(c.summary().to_string(), "Showing 2 of 3 rows");
    }

    #[test]
    fn test_explicit_action_cancels_pending_debounce() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(ControllerEvent::SearchInput("disk".into()), t0);
        c.on_event(
            ControllerEvent::ToggleFacet {
                category: FacetCategory::Type,
                value: "Warning".into(),
            },
            t0 + ms(50),
        );
        assert_eq!(c.dispatcher().sent.len(), 1);
        assert!(c.next_deadline().is_none());

        // The deadline would have fired here; nothing more is sent.
        c.tick(t0 + ms(400));
        assert_eq!(c.dispatcher().sent.len(), 1);

        c.dispatcher_mut().complete(1);
        c.tick(t0 + ms(410));
        assert_eq!(c.visible_indices(), vec![2]);
    }

    #[test]
    fn test_out_of_order_results_latest_wins() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(
            ControllerEvent::ToggleFacet {
                category: FacetCategory::Type,
                value: "Error".into(),
            },
            t0,
        );
        c.on_event(ControllerEvent::ClearAll, t0 + ms(10));
        c.on_event(
            ControllerEvent::ToggleFacet {
                category: FacetCategory::Type,
                value: "Info".into(),
            },
            t0 + ms(20),
        );
        assert_eq!(c.dispatcher().last_seq(), 3);

        // Newest completes first.
        c.dispatcher_mut().complete(3);
        assert!(c.tick(t0 + ms(30)));
        assert_eq!(c.visible_indices(), vec![0]);
        assert!(!c.in_progress());

        // Stale results arriving later are ignored.
        c.dispatcher_mut().complete(1);
        c.dispatcher_mut().complete(2);
        assert!(!c.tick(t0 + ms(40)));
        assert_eq!(c.visible_indices(), vec![0]);
    }

    #[test]
    fn test_progress_stays_until_latest_resolves() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(ControllerEvent::ToggleRegex, t0);
        c.on_event(ControllerEvent::ToggleRegex, t0);
        c.dispatcher_mut().complete(1);
        c.tick(t0);
        assert!(c.in_progress(), "result for a superseded pass must not hide progress");
        c.dispatcher_mut().complete(2);
        c.tick(t0);
        assert!(!c.in_progress());
    }

    #[test]
    fn test_invalid_pattern_keeps_view_and_reports() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(
            ControllerEvent::ToggleFacet {
                category: FacetCategory::Type,
                value: "Error".into(),
            },
            t0,
        );
        c.dispatcher_mut().complete(1);
        c.tick(t0);
        assert_eq!(c.visible_indices(), vec![1]);

        c.on_event(ControllerEvent::ToggleRegex, t0);
        c.dispatcher_mut().complete(2);
        c.tick(t0);

        c.on_event(ControllerEvent::SearchInput("(".into()), t0);
        c.tick(t0 + ms(300));
        assert_eq!(c.dispatcher().sent.len(), 2, "no pass for an invalid pattern");
        assert!(c.pattern_error().is_some());
        assert!(!c.in_progress());
        assert_eq!(c.visible_indices(), vec![1]);

        // Fixing the pattern clears the error.
        c.on_event(ControllerEvent::SearchInput("time(out)?".into()), t0 + ms(400));
        assert!(c.pattern_error().is_none());
        c.tick(t0 + ms(700));
        assert_eq!(c.dispatcher().sent.len(), 3);
    }

    #[test]
    fn test_mode_change_clears_pattern_error() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(ControllerEvent::ToggleRegex, t0);
        c.on_event(ControllerEvent::SearchInput("[".into()), t0);
        c.tick(t0 + ms(300));
        assert!(c.pattern_error().is_some());

        c.on_event(ControllerEvent::ToggleRegex, t0 + ms(310));
        assert!(c.pattern_error().is_none());
        assert_eq!(c.inputs().mode, SearchMode::Literal);
    }

    #[test]
    fn test_anchor_toggle_and_label() {
        let mut c = controller();
        let t0 = Instant::now();
        let anchor = "01-15-2024 10:00:00.000+000".to_string();
        c.on_event(ControllerEvent::ToggleAnchor(anchor.clone()), t0);
        assert_eq!(
            c.time_range_label().as_deref(),
            Some("Time Range: 09:55 - 10:05 (centered on 10:00)")
        );
        c.dispatcher_mut().complete(1);
        c.tick(t0);
        assert_eq!(c.visible_indices(), vec![0, 1]);

        c.on_event(ControllerEvent::ToggleAnchor(anchor), t0);
        assert!(c.inputs().anchor.is_none());
        assert!(c.time_range_label().is_none());
    }

    #[test]
    fn test_failed_pass_keeps_view() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(ControllerEvent::SearchInput("disk".into()), t0);
        c.tick(t0 + ms(300));
        c.dispatcher_mut().fail(1);
        assert!(c.tick(t0 + ms(310)));
        assert_eq!(c.pass_failure(), Some("aborted"));
        assert_eq!(c.summary().to_string(), "Showing all 3 rows");
        assert!(!c.in_progress());
    }

    #[test]
    fn test_replace_rows_refilters() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(
            ControllerEvent::ToggleFacet {
                category: FacetCategory::Type,
                value: "Error".into(),
            },
            t0,
        );
        let more = snapshot_rows(&[
            entry("01-15-2024 09:00:00.000+000", LogType::Error, "early"),
            entry("01-15-2024 10:00:00.000+000", LogType::Info, "x"),
        ]);
        c.replace_rows(more);
        assert_eq!(c.dispatcher().last_seq(), 2);
        assert_eq!(c.dispatcher().sent[1].rows.len(), 2);

        c.dispatcher_mut().complete(1);
        c.dispatcher_mut().complete(2);
        c.tick(t0);
        assert_eq!(c.visible_indices(), vec![0]);
        assert_eq!(c.summary().to_string(), "Showing 1 of 2 rows");
    }

    #[test]
    fn test_replace_rows_with_invalid_pattern_keeps_last_filter() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(
            ControllerEvent::ToggleFacet {
                category: FacetCategory::Type,
                value: "Error".into(),
            },
            t0,
        );
        c.dispatcher_mut().complete(1);
        c.tick(t0);
        assert_eq!(c.summary().to_string(), "Showing 1 of 3 rows");

        c.on_event(ControllerEvent::ToggleRegex, t0);
        c.dispatcher_mut().complete(2);
        c.tick(t0);
        c.on_event(ControllerEvent::SearchInput("(".into()), t0);
        c.tick(t0 + ms(300));
        assert!(c.pattern_error().is_some());
        assert_eq!(c.dispatcher().sent.len(), 2);

        let more = snapshot_rows(&[
            entry("01-15-2024 09:00:00.000+000", LogType::Error, "early"),
            entry("01-15-2024 10:00:00.000+000", LogType::Info, "x"),
            entry("01-15-2024 10:05:00.000+000", LogType::Warning, "y"),
        ]);
        c.replace_rows(more);
        assert_eq!(c.dispatcher().sent.len(), 3, "new snapshot is still filtered");
        assert!(c.in_progress());

        c.dispatcher_mut().complete(3);
        c.tick(t0 + ms(310));
        assert!(!c.in_progress());
        assert_eq!(c.visible_indices(), vec![0]);
        assert_eq!(c.summary().to_string(), "Showing 1 of 3 rows");
        assert!(c.pattern_error().is_some(), "pattern error stays until the text changes");
    }

    #[test]
    fn test_zero_debounce_dispatches_immediately() {
        let rows = snapshot_rows(&[entry("01-15-2024 10:00:00.000+000", LogType::Info, "m")]);
        let settings = ControllerSettings {
            debounce: Duration::ZERO,
            ..Default::default()
        };
        let mut c = FilterController::new(ManualDispatcher::default(), rows, settings);
        c.on_event(ControllerEvent::SearchInput("m".into()), Instant::now());
        assert_eq!(c.dispatcher().sent.len(), 1);
    }
}
