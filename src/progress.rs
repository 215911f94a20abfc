//! Progress aggregation.
//!
//! Counters are mutex-guarded; a throttled reporter clones a snapshot,
//! releases the mutex, and only then pushes it to the caller-provided
//! [`crate::sinks::ProgressSink`] — the sink runs with no lock held, so it
//! may be called concurrently (and out of order) by whichever worker
//! threads finish jobs around the same time; see the contract spelled out
//! on [`crate::sinks::ProgressSink`]. The out-of-band status signal and
//! discovery's skip/fallback warnings bypass the throttle and emit
//! immediately.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::{ScanPhase, ScanProgress, ScanStatus};
use crate::sinks::ProgressSink;
use crate::sync_ext::MutexExt;

pub struct Progress {
    state: Mutex<ScanProgress>,
    sink: Option<ProgressSink>,
    throttle: Duration,
    last_emit: Mutex<Option<Instant>>,
}

impl Progress {
    pub fn new(total: usize, start_time_unix: i64, sink: Option<ProgressSink>, throttle: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ScanProgress::new(total, start_time_unix)),
            sink,
            throttle,
            last_emit: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> ScanProgress {
        self.state.lock_unpoisoned().clone()
    }

    /// Update the total file count once discovery has finished (the
    /// Controller creates one [`Progress`] before discovery runs so
    /// discovery's skip/fallback warnings reach the real [`ProgressSink`],
    /// then fills in `total` here once it is known).
    pub fn set_total(&self, total: usize) {
        {
            let mut state = self.state.lock_unpoisoned();
            state.total = total;
        }
        self.maybe_emit(false);
    }

    pub fn set_phase(&self, phase: ScanPhase) {
        {
            let mut state = self.state.lock_unpoisoned();
            state.phase = phase;
        }
        self.maybe_emit(true);
    }

    /// Record a job's start (spec: "current file (most recent start)").
    pub fn set_current_file(&self, path: &str) {
        {
            let mut state = self.state.lock_unpoisoned();
            state.current_file = Some(path.to_string());
        }
        self.maybe_emit(false);
    }

    /// Called after the WAL append for a completed job, strictly before any
    /// user-visible progress callback for it.
    pub fn record_result(&self, status: ScanStatus) {
        {
            let mut state = self.state.lock_unpoisoned();
            state.record(status);
        }
        self.maybe_emit(false);
    }

    /// Emit a snapshot immediately, bypassing the throttle window. Used for
    /// the out-of-band status signal and for skip/fallback warnings.
    pub fn force_emit(&self) {
        self.maybe_emit(true);
    }

    /// Discovery skip/fallback warnings are surfaced through the progress
    /// channel too, so a caller with only a `ProgressSink` still observes
    /// them, in addition to the `tracing::warn!` the caller already emitted.
    pub fn emit_warning(&self, message: &str) {
        {
            let mut state = self.state.lock_unpoisoned();
            state.current_file = Some(format!("warning: {message}"));
        }
        self.force_emit();
    }

    pub fn warning_sink(self: &Arc<Self>) -> ProgressWarningSink {
        ProgressWarningSink {
            progress: Some(self.clone()),
        }
    }

    fn maybe_emit(&self, force: bool) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let mut last_emit = self.last_emit.lock_unpoisoned();
        let now = Instant::now();
        let due = force
            || last_emit
                .map(|t| now.duration_since(t) >= self.throttle)
                .unwrap_or(true);
        if !due {
            return;
        }
        *last_emit = Some(now);
        let snapshot = self.snapshot();
        // Drop both locks before calling out: the sink is caller code we
        // don't control the runtime of, and must not be invoked while
        // holding a lock other callers (other workers finishing jobs) need.
        drop(last_emit);
        sink(&snapshot);
    }
}

/// Thin handle Discovery (and other non-Progress-owning components) use to
/// surface skip/fallback warnings without depending on the full [`Progress`]
/// API.
#[derive(Clone)]
pub struct ProgressWarningSink {
    progress: Option<Arc<Progress>>,
}

impl ProgressWarningSink {
    pub fn noop() -> Self {
        Self { progress: None }
    }

    pub fn attached(progress: &Arc<Progress>) -> Self {
        Self {
            progress: Some(progress.clone()),
        }
    }

    pub fn warn(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress.emit_warning(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn record_result_updates_counts_consistently() {
        let progress = Progress::new(3, 0, None, Duration::from_millis(0));
        progress.record_result(ScanStatus::Healthy);
        progress.record_result(ScanStatus::Corrupt);
        let snap = progress.snapshot();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.healthy + snap.corrupt + snap.suspicious + snap.error, snap.processed);
    }

    #[test]
    fn throttle_limits_sink_invocations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sink: ProgressSink = Box::new(move |_snap| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        let progress = Progress::new(10, 0, Some(sink), Duration::from_secs(3600));
        for _ in 0..5 {
            progress.record_result(ScanStatus::Healthy);
        }
        // First emit always goes through (no prior last_emit), subsequent
        // ones are throttled away within the same window.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn force_emit_bypasses_throttle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sink: ProgressSink = Box::new(move |_snap| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        let progress = Progress::new(10, 0, Some(sink), Duration::from_secs(3600));
        progress.record_result(ScanStatus::Healthy);
        progress.force_emit();
        progress.force_emit();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
