//! Progress callbacks and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecProgressEvent {
    /// Overall completion, `0..=100`, never decreasing within a run.
    pub percent: u8,
    pub message: String,
    /// Source-relative path of the file being processed, empty between files.
    pub file_current: String,
}

/// Receiver of progress events.
pub trait ProgressSink {
    fn on_progress(&mut self, event: &SpecProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&SpecProgressEvent),
{
    fn on_progress(&mut self, event: &SpecProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _event: &SpecProgressEvent) {}
}

/// Run phases with their share of the overall percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPhase {
    Scan,
    Directories,
    Orphans,
    Primary,
    Secondary,
    PassThrough,
    Repair,
}

impl EnumPhase {
    /// `(start, end)` percent of this phase.
    pub fn span(self) -> (u8, u8) {
        match self {
            Self::Scan => (0, 10),
            Self::Directories => (10, 15),
            Self::Orphans => (15, 35),
            Self::Primary => (35, 65),
            Self::Secondary => (65, 80),
            Self::PassThrough => (80, 90),
            Self::Repair => (90, 99),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Scan => "Scanning source",
            Self::Directories => "Creating folders",
            Self::Orphans => "Copying unreferenced documents",
            Self::Primary => "Copying documents",
            Self::Secondary => "Copying drawings",
            Self::PassThrough => "Copying other files",
            Self::Repair => "Repairing references",
        }
    }
}

/// Clamps reported percentages so a sink never sees progress go backwards.
pub struct ProgressTracker<'a, P: ProgressSink + ?Sized> {
    sink: &'a mut P,
    n_percent_last: u8,
}

impl<'a, P: ProgressSink + ?Sized> ProgressTracker<'a, P> {
    pub fn new(sink: &'a mut P) -> Self {
        Self {
            sink,
            n_percent_last: 0,
        }
    }

    pub fn percent_last(&self) -> u8 {
        self.n_percent_last
    }

    pub fn report(&mut self, percent: u8, message: &str, file_current: &str) {
        let n_percent = percent.min(100).max(self.n_percent_last);
        self.n_percent_last = n_percent;
        self.sink.on_progress(&SpecProgressEvent {
            percent: n_percent,
            message: message.to_string(),
            file_current: file_current.to_string(),
        });
    }

    /// Report the start of `enum_phase`.
    pub fn report_phase(&mut self, enum_phase: EnumPhase) {
        let (n_start, _) = enum_phase.span();
        self.report(n_start, enum_phase.label(), "");
    }

    /// Report item `n_done` of `n_total` inside `enum_phase`.
    pub fn report_step(
        &mut self,
        enum_phase: EnumPhase,
        n_done: usize,
        n_total: usize,
        file_current: &str,
    ) {
        let (n_start, n_end) = enum_phase.span();
        let n_width = usize::from(n_end - n_start);
        let n_offset = n_done
            .saturating_mul(n_width)
            .checked_div(n_total)
            .unwrap_or(n_width)
            .min(n_width);
        let n_percent = n_start.saturating_add(u8::try_from(n_offset).unwrap_or(n_end - n_start));
        self.report(n_percent, enum_phase.label(), file_current);
    }
}

/// Shared cancellation flag; checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, EnumPhase, NoProgress, ProgressTracker, SpecProgressEvent};

    #[test]
    fn tracker_never_goes_backwards() {
        let mut l_events: Vec<SpecProgressEvent> = Vec::new();
        let mut sink = |event: &SpecProgressEvent| l_events.push(event.clone());
        {
            let mut tracker = ProgressTracker::new(&mut sink);
            tracker.report(40, "a", "");
            tracker.report(20, "b", "x.ipt");
            tracker.report(250, "c", "");
        }
        let l_percent: Vec<u8> = l_events.iter().map(|e| e.percent).collect();
        assert_eq!(l_percent, vec![40, 40, 100]);
        assert_eq!(l_events[1].file_current, "x.ipt");
    }

    #[test]
    fn tracker_steps_stay_inside_phase_span() {
        let mut l_percent: Vec<u8> = Vec::new();
        let mut sink = |event: &SpecProgressEvent| l_percent.push(event.percent);
        {
            let mut tracker = ProgressTracker::new(&mut sink);
            for n_done in 1..=7 {
                tracker.report_step(EnumPhase::Primary, n_done, 7, "f");
            }
            tracker.report_step(EnumPhase::Secondary, 0, 0, "f");
        }
        assert!(l_percent.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(l_percent[6], 65);
        assert!(l_percent.iter().all(|v| (35..=80).contains(v)));
    }

    #[test]
    fn no_progress_sink_accepts_events() {
        let mut sink = NoProgress;
        let mut tracker = ProgressTracker::new(&mut sink);
        tracker.report_phase(EnumPhase::Scan);
        assert_eq!(tracker.percent_last(), 0);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let token_clone = token.clone();
        assert!(!token.is_cancelled());
        token_clone.cancel();
        assert!(token.is_cancelled());
    }
}
