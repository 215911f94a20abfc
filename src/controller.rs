//! Top-level entry point: validates input, wires together discovery, the
//! scheduler, the WAL, and progress reporting, and returns a
//! [`ScanSummary`] even on interrupt or fatal error — the WAL is always
//! finalized best-effort before returning, so a subsequent resume sees a
//! consistent prefix. Owns a linear chain: this value owns the
//! [`crate::scheduler::Scheduler`] and holds the only handles to the WAL
//! and Progress for the run, so nothing here forms a reference cycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::config::{ScanConfig, DEFAULT_INSPECTOR_NAME};
use crate::discovery::{self, ContentProbe};
use crate::domain::{ScanMode, ScanSummary, StopReason};
use crate::error::ScanError;
use crate::inspector::InspectorDriver;
use crate::progress::Progress;
use crate::scheduler::Scheduler;
use crate::signals::SignalGuard;
use crate::sinks::{ProgressSink, ResultSink, SummarySink};
use crate::sync_ext::MutexExt;
use crate::wal::{ResumeLog, WalParams};

/// Minimum interval between background polls for a pending out-of-band
/// status request while a pass blocks the calling thread inside the worker
/// pool.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default throttle between [`ProgressSink`] emissions.
const DEFAULT_PROGRESS_THROTTLE: Duration = Duration::from_millis(250);

/// Worker count ceiling.
const MAX_WORKERS: usize = 32;

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Top-level entry point for running a scan. Stateless: every call wires a
/// fresh [`Scheduler`], [`Progress`], and [`ResumeLog`] for the run's
/// lifetime and tears them down before returning.
pub struct ScanController;

impl ScanController {
    /// Validate `config`, run discovery, drive the scheduler to completion
    /// (or interruption), and return a [`ScanSummary`].
    ///
    /// `content_probe` is the optional external `(path) -> is_video?`
    /// collaborator; it is consulted by discovery only, never retained past
    /// this call.
    pub fn run(
        config: ScanConfig,
        progress_sink: Option<ProgressSink>,
        mut result_sink: Option<ResultSink>,
        summary_sink: Option<SummarySink>,
        content_probe: Option<&ContentProbe<'_>>,
    ) -> Result<ScanSummary, ScanError> {
        if !config.root.is_dir() {
            return Err(ScanError::Input {
                path: config.root.display().to_string(),
                reason: "root does not exist or is not a directory".to_string(),
            });
        }

        let inspector_binary = resolve_inspector_binary(&config)?;
        let worker_count = config.worker_count.clamp(1, MAX_WORKERS);
        let started_at = now_unix();

        let cancel = Arc::new(AtomicBool::new(false));
        let stop_reason: Arc<Mutex<Option<StopReason>>> = Arc::new(Mutex::new(None));
        let signal_guard = SignalGuard::install(cancel.clone(), stop_reason.clone());

        let root_str = config.root.display().to_string();
        let wal_params = WalParams {
            root: root_str.clone(),
            mode: config.mode,
            extensions: config.extensions().to_vec(),
        };
        let output_dir = config.effective_output_dir();

        let loaded = if config.resume_enabled {
            ResumeLog::load_existing(&output_dir, &wal_params)
                .map_err(|err| ScanError::Wal { reason: err.to_string() })?
        } else {
            Default::default()
        };

        if loaded.header_matched && loaded.already_complete {
            tracing::info!(root = %root_str, "resume log already complete; short-circuiting scan");
            let summary = summary_from_footer(&config, &root_str, started_at, &loaded);
            emit_already_final_results(&loaded.prior_results, result_sink.as_mut());
            if let Some(sink) = summary_sink {
                sink(&summary);
            }
            return Ok(summary);
        }

        let wal = open_wal_for_run(&output_dir, &wal_params, &loaded, started_at)
            .map_err(|err| ScanError::Wal { reason: err.to_string() })?;

        // Created before discovery so skip/fallback warnings reach the real
        // `ProgressSink`; `total` is back-filled once discovery finishes.
        let progress = Progress::new(0, started_at, progress_sink, DEFAULT_PROGRESS_THROTTLE);
        let discovery_warnings = progress.warning_sink();
        let files = discovery::discover(
            &config.root,
            config.recursive,
            config.extensions(),
            content_probe,
            &discovery_warnings,
        )
        .map_err(|err| ScanError::Input {
            path: root_str.clone(),
            reason: err.to_string(),
        })?;
        progress.set_total(files.len());

        if config.mode == ScanMode::Hybrid {
            progress.set_phase(crate::domain::ScanPhase::QuickScan);
        } else {
            progress.set_phase(match config.mode {
                ScanMode::Quick => crate::domain::ScanPhase::QuickScan,
                _ => crate::domain::ScanPhase::DeepScan,
            });
        }

        if files.is_empty() {
            tracing::info!(root = %root_str, "no candidate files discovered");
            let summary = ScanSummary {
                root: root_str.clone(),
                mode: config.mode,
                healthy: 0,
                corrupt: 0,
                suspicious: 0,
                error: 0,
                total: 0,
                scan_time_seconds: 0.0,
                resumed: false,
                started_at_unix: started_at,
                completed_at_unix: Some(now_unix()),
                stop_reason: None,
            };
            finalize_and_discard(wal, &summary);
            drop(signal_guard);
            if let Some(sink) = summary_sink {
                sink(&summary);
            }
            return Ok(summary);
        }

        let wal = Arc::new(wal);
        let driver = InspectorDriver::new(inspector_binary, config.quick_timeout, config.deep_timeout);
        let scheduler = Scheduler::new(driver, worker_count, cancel.clone(), progress.clone());

        let done = Arc::new(AtomicBool::new(false));
        let status_watcher = spawn_status_watcher(signal_guard, progress.clone(), done.clone());

        let outcome = scheduler.run(files, config.mode, &loaded.prior_results, &wal, result_sink.as_mut());

        done.store(true, Ordering::SeqCst);
        let signal_guard = status_watcher.join().unwrap_or(None);

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                drop(signal_guard);
                return Err(ScanError::Wal { reason: err.to_string() });
            }
        };

        let resumed = !loaded.prior_results.is_empty();
        let scan_time = started_at_elapsed(started_at);

        if let Some(reason) = outcome.wal_error {
            let summary = partial_summary(&config, &root_str, started_at, scan_time, resumed, &outcome.results, None);
            drop(signal_guard);
            if let Some(sink) = summary_sink {
                sink(&summary);
            }
            return Err(ScanError::Wal { reason });
        }

        let wal = Arc::try_unwrap(wal).unwrap_or_else(|_| panic!("scheduler did not release all WAL handles"));

        if outcome.cancelled {
            let reason = stop_reason.lock_unpoisoned().unwrap_or(StopReason::Interrupt);
            let summary = partial_summary(
                &config,
                &root_str,
                started_at,
                scan_time,
                resumed,
                &outcome.results,
                Some(reason),
            );
            // Deliberately not finalized: an incomplete WAL (no footer) is
            // what makes a subsequent identical run resumable.
            drop(wal);
            drop(signal_guard);
            if let Some(sink) = summary_sink {
                sink(&summary);
            }
            return Ok(summary);
        }

        let mut summary = ScanSummary {
            root: root_str,
            mode: config.mode,
            healthy: outcome.results.iter().filter(|r| r.status == crate::domain::ScanStatus::Healthy).count(),
            corrupt: outcome.results.iter().filter(|r| r.status == crate::domain::ScanStatus::Corrupt).count(),
            suspicious: outcome
                .results
                .iter()
                .filter(|r| r.status == crate::domain::ScanStatus::Suspicious)
                .count(),
            error: outcome.results.iter().filter(|r| r.status == crate::domain::ScanStatus::Error).count(),
            total: outcome.results.len(),
            scan_time_seconds: scan_time,
            resumed,
            started_at_unix: started_at,
            completed_at_unix: Some(now_unix()),
            stop_reason: None,
        };
        summary.completed_at_unix = Some(now_unix());
        finalize_and_discard(wal, &summary);
        drop(signal_guard);

        if let Some(sink) = summary_sink {
            sink(&summary);
        }
        Ok(summary)
    }
}

fn started_at_elapsed(started_at: i64) -> f64 {
    (now_unix() - started_at).max(0) as f64
}

fn resolve_inspector_binary(config: &ScanConfig) -> Result<std::path::PathBuf, ScanError> {
    match &config.inspector_binary {
        Some(path) => {
            if !path.is_file() {
                return Err(ScanError::Driver {
                    path: path.display().to_string(),
                    reason: "configured inspector binary does not exist".to_string(),
                });
            }
            Ok(path.clone())
        }
        None => InspectorDriver::resolve_from_path(DEFAULT_INSPECTOR_NAME).map_err(|err| ScanError::Driver {
            path: DEFAULT_INSPECTOR_NAME.to_string(),
            reason: err.to_string(),
        }),
    }
}

fn open_wal_for_run(
    output_dir: &Path,
    params: &WalParams,
    loaded: &crate::wal::WalLoadResult,
    started_at: i64,
) -> anyhow::Result<ResumeLog> {
    let effective_started_at = loaded.started_at.unwrap_or(started_at);
    ResumeLog::create(output_dir, params, effective_started_at)
}

fn finalize_and_discard(mut wal: ResumeLog, summary: &ScanSummary) {
    if let Err(err) = wal.finalize(summary) {
        tracing::error!(error = %err, "failed to finalize resume log");
        return;
    }
    if let Err(err) = wal.discard() {
        tracing::warn!(error = %err, "failed to discard resume log after clean completion");
    }
}

fn summary_from_footer(
    config: &ScanConfig,
    root: &str,
    started_at: i64,
    loaded: &crate::wal::WalLoadResult,
) -> ScanSummary {
    let footer = loaded.footer.clone().expect("already_complete implies a footer");
    ScanSummary {
        root: root.to_string(),
        mode: config.mode,
        healthy: footer.totals.healthy,
        corrupt: footer.totals.corrupt,
        suspicious: footer.totals.suspicious,
        error: footer.totals.error,
        total: footer.totals.healthy + footer.totals.corrupt + footer.totals.suspicious + footer.totals.error,
        scan_time_seconds: footer.scan_time,
        resumed: true,
        started_at_unix: loaded.started_at.unwrap_or(started_at),
        completed_at_unix: Some(footer.completed_at),
        stop_reason: None,
    }
}

fn emit_already_final_results(results: &[crate::domain::ScanResult], result_sink: Option<&mut ResultSink>) {
    let Some(sink) = result_sink else {
        return;
    };
    let mut sorted: Vec<&crate::domain::ScanResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    for result in sorted {
        sink(result);
    }
}

#[allow(clippy::too_many_arguments)]
fn partial_summary(
    config: &ScanConfig,
    root: &str,
    started_at: i64,
    scan_time: f64,
    resumed: bool,
    results: &[crate::domain::ScanResult],
    stop_reason: Option<StopReason>,
) -> ScanSummary {
    use crate::domain::ScanStatus;
    ScanSummary {
        root: root.to_string(),
        mode: config.mode,
        healthy: results.iter().filter(|r| r.status == ScanStatus::Healthy).count(),
        corrupt: results.iter().filter(|r| r.status == ScanStatus::Corrupt).count(),
        suspicious: results.iter().filter(|r| r.status == ScanStatus::Suspicious).count(),
        error: results.iter().filter(|r| r.status == ScanStatus::Error).count(),
        total: results.len(),
        scan_time_seconds: scan_time,
        resumed,
        started_at_unix: started_at,
        completed_at_unix: None,
        stop_reason,
    }
}

/// Poll for the out-of-band status-request signal while a scheduler pass
/// blocks the calling thread. Returns the [`SignalGuard`] back to the caller
/// once `done` is set, so it stays alive (and installed) for the whole
/// duration of the scan.
fn spawn_status_watcher(
    guard: SignalGuard,
    progress: Arc<Progress>,
    done: Arc<AtomicBool>,
) -> std::thread::JoinHandle<Option<SignalGuard>> {
    std::thread::Builder::new()
        .name("corrupt-scan-status-watcher".to_string())
        .spawn(move || {
            while !done.load(Ordering::SeqCst) {
                if guard.take_status_request() {
                    progress.force_emit();
                }
                std::thread::sleep(STATUS_POLL_INTERVAL);
            }
            Some(guard)
        })
        .expect("failed to spawn status watcher thread")
}
