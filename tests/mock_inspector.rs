//! Stand-in "inspector" binary for integration tests, grounded on the
//! teacher's `tests/ffui_mock_ffmpeg.rs` mock-ffmpeg harness binary. Behavior
//! is controlled entirely through environment variables so the Driver,
//! Worker Pool, and Scheduler can be exercised end-to-end without a real
//! FFmpeg install:
//!
//! - `MOCK_INSPECTOR_EXIT_CODE` — process exit code (default 0).
//! - `MOCK_INSPECTOR_STDERR` — text written to stderr before exiting.
//! - `MOCK_INSPECTOR_SLEEP_MS` — how long to sleep (in small increments)
//!   before writing stderr and exiting; used to exercise timeouts and
//!   cancellation.
//! - `MOCK_INSPECTOR_IGNORE_TERM` — when set, installs a SIGTERM handler
//!   that ignores the signal, forcing the driver's grace-window escalation
//!   to SIGKILL.

#[cfg(unix)]
fn ignore_sigterm() {
    unsafe {
        libc::signal(libc::SIGTERM, libc::SIG_IGN);
    }
}

fn main() {
    #[cfg(unix)]
    if std::env::var_os("MOCK_INSPECTOR_IGNORE_TERM").is_some() {
        ignore_sigterm();
    }

    let sleep_ms: u64 = std::env::var("MOCK_INSPECTOR_SLEEP_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut remaining = sleep_ms;
    while remaining > 0 {
        let step = remaining.min(50);
        std::thread::sleep(std::time::Duration::from_millis(step));
        remaining -= step;
    }

    if let Ok(stderr_text) = std::env::var("MOCK_INSPECTOR_STDERR") {
        eprint!("{stderr_text}");
    }

    let exit_code: i32 = std::env::var("MOCK_INSPECTOR_EXIT_CODE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    std::process::exit(exit_code);
}
