//! A fixed set of persistent worker threads pulling `(VideoFile, ScanDepth,
//! callback)` jobs off a single shared queue, a condvar-driven consumer-loop
//! with concurrency fixed for the lifetime of one scan: a strict upper bound
//! on concurrent external processes equal to N.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::classifier;
use crate::domain::{ScanDepth, ScanResult, ScanStatus, VideoFile};
use crate::inspector::InspectorDriver;
use crate::progress::Progress;
use crate::signals::CancelToken;
use crate::sync_ext::{CondvarExt, MutexExt};

type Callback = Box<dyn FnOnce(ScanResult) + Send>;

struct Job {
    file: VideoFile,
    depth: ScanDepth,
    callback: Callback,
}

struct State {
    queue: VecDeque<Job>,
    active: usize,
    shutdown: bool,
}

struct Inner {
    state: Mutex<State>,
    cv: Condvar,
    driver: InspectorDriver,
    cancel: CancelToken,
    progress: Arc<Progress>,
}

/// Bounded concurrent dispatcher of inspection jobs. Created fresh per scan
/// pass by the [`crate::scheduler`].
pub struct WorkerPool {
    inner: Arc<Inner>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `concurrency` persistent worker threads (minimum 1).
    pub fn new(concurrency: usize, driver: InspectorDriver, cancel: CancelToken, progress: Arc<Progress>) -> Self {
        let concurrency = concurrency.max(1);
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                active: 0,
                shutdown: false,
            }),
            cv: Condvar::new(),
            driver,
            cancel,
            progress,
        });

        let threads = (0..concurrency)
            .map(|index| {
                let inner = inner.clone();
                thread::Builder::new()
                    .name(format!("corrupt-scan-worker-{index}"))
                    .spawn(move || worker_loop(&inner))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { inner, threads }
    }

    /// Enqueue one job for dispatch, at most `concurrency` running at once.
    /// FIFO submission order; fairness across jobs is not guaranteed beyond
    /// that.
    pub fn submit(&self, file: VideoFile, depth: ScanDepth, callback: impl FnOnce(ScanResult) + Send + 'static) {
        let mut state = self.inner.state.lock_unpoisoned();
        state.queue.push_back(Job {
            file,
            depth,
            callback: Box::new(callback),
        });
        drop(state);
        self.inner.cv.notify_one();
    }

    /// Block until the queue is empty and no job is in flight (the pool is
    /// idle). Used by the Scheduler between pass 1 and pass 2.
    pub fn wait_idle(&self) {
        let guard = self.inner.state.lock_unpoisoned();
        let _guard = self
            .inner
            .cv
            .wait_while_unpoisoned(guard, |state| !state.queue.is_empty() || state.active > 0);
    }

    /// Stop accepting further work, drain in-flight jobs (the cancel token
    /// they already observe causes the Driver to terminate its child
    /// process group), and join all worker threads.
    pub fn shutdown(mut self) {
        {
            let mut state = self.inner.state.lock_unpoisoned();
            state.shutdown = true;
        }
        self.inner.cv.notify_all();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(inner: &Arc<Inner>) {
    loop {
        let job = {
            let mut state = inner.state.lock_unpoisoned();
            loop {
                if inner.cancel.load(Ordering::SeqCst) {
                    // Cancellation requested: drop whatever is already queued
                    // instead of dispatching it. No new jobs start after
                    // cancellation.
                    if !state.queue.is_empty() {
                        tracing::debug!(dropped = state.queue.len(), "draining queue after cancel");
                        state.queue.clear();
                        inner.cv.notify_all();
                    }
                    if state.shutdown {
                        return;
                    }
                    state = inner.cv.wait_unpoisoned(state);
                    continue;
                }
                if let Some(job) = state.queue.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.shutdown {
                    return;
                }
                state = inner.cv.wait_unpoisoned(state);
            }
        };

        let path_display = job.file.path().display().to_string();
        tracing::debug!(path = %path_display, depth = %job.depth, "dispatching job");
        inner.progress.set_current_file(&path_display);
        let result = run_job(&inner.driver, &job.file, job.depth, &inner.cancel);
        match result {
            Some(result) => (job.callback)(result),
            None => tracing::debug!(
                path = %job.file.path().display(),
                "job suppressed: cancelled before classification"
            ),
        }

        {
            let mut state = inner.state.lock_unpoisoned();
            state.active -= 1;
        }
        inner.cv.notify_all();
    }
}

/// Run the driver then the classifier for one job, catching both explicit
/// errors and panics and folding either into an `error`-status result — an
/// exception here never halts the pool. Returns `None` when the job was
/// killed by `cancel` tripping mid-run: a cancelled job was never classified,
/// so it produces no `ScanResult` at all, rather than one the classifier was
/// never consulted for.
fn run_job(driver: &InspectorDriver, file: &VideoFile, depth: ScanDepth, cancel: &CancelToken) -> Option<ScanResult> {
    let path = file.path().display().to_string();
    let start = std::time::Instant::now();

    let outcome = catch_unwind(AssertUnwindSafe(|| driver.inspect(file, depth, cancel)));

    match outcome {
        Ok(Ok(driver_outcome)) => {
            if driver_outcome.cancelled {
                tracing::debug!(path = %path, "driver outcome cancelled, suppressing result");
                return None;
            }
            let classification = classifier::classify(&driver_outcome, depth);
            tracing::debug!(path = %path, status = %classification.status, "classified");
            let mut result = ScanResult::new(
                path,
                classification.status,
                depth,
                start.elapsed().as_secs_f64(),
                classification.confidence,
                classification.reason,
            );
            if !driver_outcome.stderr_text.trim().is_empty() {
                result = result.with_diagnostic(driver_outcome.stderr_text);
            }
            Some(result)
        }
        Ok(Err(err)) => {
            tracing::warn!(path = %path, error = %err, "driver error");
            Some(error_result(path, depth, start.elapsed().as_secs_f64(), err.to_string()))
        }
        Err(payload) => {
            let message = panic_payload_to_string(&*payload);
            tracing::error!(path = %path, panic = %message, "job panicked");
            Some(error_result(path, depth, start.elapsed().as_secs_f64(), format!("job panicked: {message}")))
        }
    }
}

fn error_result(path: String, depth: ScanDepth, elapsed: f64, reason: String) -> ScanResult {
    ScanResult::new(path, ScanStatus::Error, depth, elapsed, 0.0, reason)
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic payload".to_string()
}
