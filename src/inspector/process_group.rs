//! Platform process-group helpers for the inspector driver.
//!
//! The inspector is always spawned as the head of its own process group so
//! that on timeout or cancellation the whole tree (ffmpeg plus any helper
//! processes it forks) can be terminated in one shot.

use std::process::Command;

#[cfg(unix)]
pub(crate) fn put_in_new_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            // Become a process group leader; SIGTERM/SIGKILL sent to -pid
            // then reaches every descendant that didn't opt out.
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn put_in_new_group(_cmd: &mut Command) {
    // Best-effort only: a process-group job-object equivalent on Windows
    // requires `Win32_System_JobObjects`, which is out of reach without the
    // `windows` crate. Timeout handling still terminates the direct child.
}

/// Send a graceful-then-forceful termination to the process group headed by
/// `pid`: a terminate signal to the group, a short grace window, then a
/// force-kill if it hasn't exited.
#[cfg(unix)]
pub(crate) fn terminate_group(pid: u32, grace: std::time::Duration) -> bool {
    let pid = pid as i32;
    unsafe {
        libc::kill(-pid, libc::SIGTERM);
    }
    let deadline = std::time::Instant::now() + grace;
    while std::time::Instant::now() < deadline {
        // ESRCH means the group is gone; we can stop polling early.
        let probe = unsafe { libc::kill(-pid, 0) };
        if probe != 0 {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
    false
}

#[cfg(not(unix))]
pub(crate) fn terminate_group(_pid: u32, _grace: std::time::Duration) -> bool {
    false
}
