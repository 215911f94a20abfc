//! Signal-driven shutdown coordination.
//!
//! Interrupt and terminate requests are treated identically and installed
//! through the `ctrlc` crate's `termination` feature, which already unifies
//! SIGINT, SIGTERM, and SIGHUP into one graceful-shutdown callback. The
//! out-of-band status-request signal (SIGUSR1 on unix; a no-op elsewhere) is
//! wired separately through a raw libc handler since `ctrlc` only covers the
//! termination family.
//!
//! Handlers must be safe to install and uninstall: a [`SignalGuard`]
//! restores the process to "no handler pointed at this scan" state on drop.
//! `ctrlc::set_handler` can only be registered once per process, so the
//! crate installs its closure once and redirects it through a swappable
//! shared slot for each scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use once_cell::sync::Lazy;

use crate::domain::StopReason;
use crate::sync_ext::MutexExt;

pub type CancelToken = Arc<AtomicBool>;

struct SignalTargets {
    cancel: CancelToken,
    stop_reason: Arc<Mutex<Option<StopReason>>>,
}

static SIGNAL_SLOT: Lazy<Mutex<Option<SignalTargets>>> = Lazy::new(|| Mutex::new(None));
static CTRLC_INSTALLED: Once = Once::new();

#[cfg(unix)]
static STATUS_REQUESTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn handle_status_signal(_signum: libc::c_int) {
    STATUS_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_status_handler() {
    unsafe {
        libc::signal(libc::SIGUSR1, handle_status_signal as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_status_handler() {}

/// Installed for the lifetime of one [`crate::controller::ScanController`]
/// run. On drop, the shared target slot is cleared so a stray late signal
/// does nothing.
pub struct SignalGuard {
    _private: (),
}

impl SignalGuard {
    pub fn install(cancel: CancelToken, stop_reason: Arc<Mutex<Option<StopReason>>>) -> Self {
        CTRLC_INSTALLED.call_once(|| {
            let _ = ctrlc::set_handler(|| {
                if let Some(targets) = SIGNAL_SLOT.lock_unpoisoned().as_ref() {
                    targets.cancel.store(true, Ordering::SeqCst);
                    let mut reason = targets.stop_reason.lock_unpoisoned();
                    if reason.is_none() {
                        *reason = Some(StopReason::Interrupt);
                    }
                }
            });
            install_status_handler();
        });

        *SIGNAL_SLOT.lock_unpoisoned() = Some(SignalTargets { cancel, stop_reason });
        SignalGuard { _private: () }
    }

    /// Non-blocking check for a pending out-of-band status request.
    #[cfg(unix)]
    pub fn take_status_request(&self) -> bool {
        STATUS_REQUESTED.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(unix))]
    pub fn take_status_request(&self) -> bool {
        false
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        *SIGNAL_SLOT.lock_unpoisoned() = None;
    }
}
