//! Orchestrates one or two passes of a scan: quick, deep, full, or a
//! hybrid quick-then-deep escalation.
//!
//! Owns the [`VideoFile`] list for the lifetime of a scan and drives one or
//! two passes through a fresh [`WorkerPool`] per pass, folding results into
//! the WAL and Progress as they finalize, then emitting the final per-path
//! results once, in path order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{ScanDepth, ScanMode, ScanResult, ScanStatus, VideoFile};
use crate::inspector::InspectorDriver;
use crate::progress::Progress;
use crate::signals::CancelToken;
use crate::sinks::ResultSink;
use crate::sync_ext::MutexExt;
use crate::wal::ResumeLog;

/// Outcome of one [`Scheduler::run`] call.
pub struct SchedulerOutcome {
    /// Final per-path results, sorted by path.
    pub results: Vec<ScanResult>,
    /// Set when the scan stopped early due to cancellation; `results` then
    /// only covers the paths that reached a final status before the stop.
    pub cancelled: bool,
    /// First WAL append failure encountered, if any. When set, the cancel
    /// token is also tripped so the pool drains promptly; `results` still
    /// holds whatever reached a final status before the failure, for the
    /// controller to hand to the `ResultSink` before propagating the error.
    pub wal_error: Option<String>,
}

fn single_pass_depth(mode: ScanMode) -> ScanDepth {
    match mode {
        ScanMode::Quick => ScanDepth::Quick,
        ScanMode::Deep => ScanDepth::Deep,
        ScanMode::Full => ScanDepth::Full,
        ScanMode::Hybrid => unreachable!("hybrid uses the two-pass path"),
    }
}

/// What to do with one discovered file given the prior run's WAL state.
enum Resolution {
    /// Already final from a prior run; no work needed this run.
    AlreadyFinal(ScanResult),
    /// Needs processing at the given depth this run.
    Pending(VideoFile, ScanDepth),
}

fn resolve_hybrid(file: VideoFile, prior: Option<&ScanResult>) -> Resolution {
    match prior {
        None => Resolution::Pending(file, ScanDepth::Quick),
        Some(result) if matches!(result.depth, ScanDepth::Deep | ScanDepth::Full) => {
            Resolution::AlreadyFinal(result.clone())
        }
        Some(result) if matches!(result.status, ScanStatus::Suspicious | ScanStatus::Error) => {
            Resolution::Pending(file, ScanDepth::Deep)
        }
        Some(result) => Resolution::AlreadyFinal(result.clone()),
    }
}

fn resolve_single_pass(file: VideoFile, prior: Option<&ScanResult>, depth: ScanDepth) -> Resolution {
    match prior {
        Some(result) if result.depth == depth => Resolution::AlreadyFinal(result.clone()),
        _ => Resolution::Pending(file, depth),
    }
}

pub struct Scheduler {
    driver: InspectorDriver,
    concurrency: usize,
    cancel: CancelToken,
    progress: Arc<Progress>,
}

impl Scheduler {
    pub fn new(driver: InspectorDriver, concurrency: usize, cancel: CancelToken, progress: Arc<Progress>) -> Self {
        Self {
            driver,
            concurrency,
            cancel,
            progress,
        }
    }

    /// Run the scan over `files` for `mode`, consulting `prior_results`
    /// (already-loaded, depth-ranked per path by [`crate::wal`]) to skip or
    /// partially re-queue work, appending every job's result to `wal` as it
    /// completes and invoking `result_sink` once per path, in path order, at
    /// the end.
    pub fn run(
        &self,
        files: Vec<VideoFile>,
        mode: ScanMode,
        prior_results: &[ScanResult],
        wal: &Arc<ResumeLog>,
        mut result_sink: Option<&mut ResultSink>,
    ) -> anyhow::Result<SchedulerOutcome> {
        let prior_by_path: HashMap<&str, &ScanResult> =
            prior_results.iter().map(|r| (r.path.as_str(), r)).collect();

        let mut finals: HashMap<String, ScanResult> = HashMap::new();
        let mut pass1_pending: Vec<VideoFile> = Vec::new();
        let mut pass2_only_pending: Vec<VideoFile> = Vec::new();
        let wal_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        for file in files {
            let prior = prior_by_path.get(file.path().to_string_lossy().as_ref()).copied();
            let resolution = if mode == ScanMode::Hybrid {
                resolve_hybrid(file, prior)
            } else {
                resolve_single_pass(file, prior, single_pass_depth(mode))
            };

            match resolution {
                Resolution::AlreadyFinal(result) => {
                    self.progress.record_result(result.status);
                    finals.insert(result.path.clone(), result);
                }
                Resolution::Pending(file, depth) if mode == ScanMode::Hybrid && depth == ScanDepth::Deep => {
                    pass2_only_pending.push(file);
                }
                Resolution::Pending(file, _depth) => {
                    pass1_pending.push(file);
                }
            }
        }

        let mut cancelled = self.cancel_requested();

        if !cancelled && !pass1_pending.is_empty() {
            let depth = if mode == ScanMode::Hybrid {
                ScanDepth::Quick
            } else {
                single_pass_depth(mode)
            };
            let escalate: Arc<Mutex<Vec<VideoFile>>> = Arc::new(Mutex::new(Vec::new()));
            let pool_finals: Arc<Mutex<HashMap<String, ScanResult>>> = Arc::new(Mutex::new(HashMap::new()));

            {
                let pool = crate::worker_pool::WorkerPool::new(
                    self.concurrency,
                    self.driver.clone(),
                    self.cancel.clone(),
                    self.progress.clone(),
                );
                for file in pass1_pending {
                    let progress = self.progress.clone();
                    let escalate = escalate.clone();
                    let pool_finals = pool_finals.clone();
                    let wal = wal.clone();
                    let wal_error = wal_error.clone();
                    let cancel = self.cancel.clone();
                    let hybrid = mode == ScanMode::Hybrid;
                    let file_for_escalation = file.clone();
                    pool.submit(file, depth, move |result| {
                        wal_append_or_record_error(&wal, &result, &wal_error, &cancel);
                        if hybrid && matches!(result.status, ScanStatus::Suspicious | ScanStatus::Error) {
                            escalate.lock_unpoisoned().push(file_for_escalation);
                        } else {
                            progress.record_result(result.status);
                            pool_finals.lock_unpoisoned().insert(result.path.clone(), result);
                        }
                    });
                }
                pool.wait_idle();
                pool.shutdown();
            }

            finals.extend(take_arc_mutex(pool_finals));
            pass2_only_pending.extend(take_arc_mutex(escalate));
            cancelled = self.cancel_requested();
        }

        if mode == ScanMode::Hybrid && !cancelled && !pass2_only_pending.is_empty() {
            self.progress.set_phase(crate::domain::ScanPhase::DeepScan);
            let pool_finals: Arc<Mutex<HashMap<String, ScanResult>>> = Arc::new(Mutex::new(HashMap::new()));
            {
                let pool = crate::worker_pool::WorkerPool::new(
                    self.concurrency,
                    self.driver.clone(),
                    self.cancel.clone(),
                    self.progress.clone(),
                );
                for file in pass2_only_pending {
                    let progress = self.progress.clone();
                    let pool_finals = pool_finals.clone();
                    let wal = wal.clone();
                    let wal_error = wal_error.clone();
                    let cancel = self.cancel.clone();
                    pool.submit(file, ScanDepth::Deep, move |result| {
                        wal_append_or_record_error(&wal, &result, &wal_error, &cancel);
                        progress.record_result(result.status);
                        pool_finals.lock_unpoisoned().insert(result.path.clone(), result);
                    });
                }
                pool.wait_idle();
                pool.shutdown();
            }
            finals.extend(take_arc_mutex(pool_finals));
        } else if mode != ScanMode::Hybrid {
            // pass2_only_pending is always empty outside hybrid mode.
            debug_assert!(pass2_only_pending.is_empty());
        }

        cancelled = cancelled || self.cancel_requested();

        let mut sorted_paths: Vec<&String> = finals.keys().collect();
        sorted_paths.sort();
        let mut results = Vec::with_capacity(sorted_paths.len());
        for path in sorted_paths {
            let result = finals.get(path).expect("path came from finals keys");
            if let Some(sink) = result_sink.as_mut() {
                sink(result);
            }
            results.push(result.clone());
        }

        let wal_error = take_arc_mutex(wal_error);

        Ok(SchedulerOutcome {
            results,
            cancelled,
            wal_error,
        })
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Unwrap a pass-local `Arc<Mutex<T>>` back to its inner value. Safe to
/// `expect` here: the only other clones were held by worker-thread
/// callbacks, and every worker thread has already been joined by
/// [`crate::worker_pool::WorkerPool::shutdown`] by the time this runs.
fn take_arc_mutex<T>(arc: Arc<Mutex<T>>) -> T {
    Arc::try_unwrap(arc)
        .unwrap_or_else(|_| panic!("worker pool shutdown did not release all Arc clones"))
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
}

/// Append one result to the WAL; a failure here is fatal and surfaced by
/// the controller, so this records the first failure message and trips the
/// cancel token so the pool stops dispatching further jobs.
fn wal_append_or_record_error(
    wal: &ResumeLog,
    result: &ScanResult,
    wal_error: &Arc<Mutex<Option<String>>>,
    cancel: &CancelToken,
) {
    if let Err(err) = wal.append(result) {
        tracing::error!(path = %result.path, error = %err, "failed to append result to WAL");
        let mut slot = wal_error.lock_unpoisoned();
        if slot.is_none() {
            *slot = Some(err.to_string());
        }
        drop(slot);
        cancel.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}
