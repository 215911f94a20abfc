//! External interfaces consumed by the core: small capability records
//! expressed as boxed closures rather than an inheritance chain.

use crate::domain::{ScanProgress, ScanResult, ScanSummary};

pub use crate::progress::ProgressWarningSink;

/// Invoked with a [`ScanProgress`] snapshot; may discard rapidly. Called
/// with no lock held — [`crate::progress::Progress`] clones its state and
/// releases the lock before invoking the sink, so a slow sink cannot block
/// worker threads recording new results. Worker-completion callbacks run on
/// whichever thread finished the job, so concurrent jobs finishing at once
/// can call this sink from multiple threads at once and in either order;
/// it must be `Send + Sync` and tolerate that directly (e.g. by writing
/// each snapshot atomically, or funneling snapshots through its own
/// channel/lock if it needs a strict order).
pub type ProgressSink = Box<dyn Fn(&ScanProgress) + Send + Sync>;

/// Invoked with each final [`ScanResult`] as it becomes final. Called
/// single-threaded from the Scheduler's emit stage.
pub type ResultSink = Box<dyn FnMut(&ScanResult) + Send>;

/// Invoked exactly once at Controller return, regardless of completion
/// status.
pub type SummarySink = Box<dyn FnOnce(&ScanSummary) + Send>;
