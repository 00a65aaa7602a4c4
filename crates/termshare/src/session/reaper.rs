//! Child exit reaping.
//!
//! Watches the shell child and reports whether it exited with a code or
//! was killed by a signal. SIGCHLD wakes the watcher promptly; a short
//! polling interval covers signals delivered before registration or
//! coalesced by the kernel.

use std::time::Duration;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use super::ExitOutcome;

/// How often to poll `waitpid` between SIGCHLD deliveries.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Watches the child with the given PID and reports its exit outcome.
///
/// The returned channel starts at `None` and transitions exactly once
/// to `Some(outcome)` when the child is reaped. Stop and continue
/// events are discarded; a suspended shell is still a live session.
pub fn watch_child(pid: u32) -> std::io::Result<watch::Receiver<Option<ExitOutcome>>> {
    let mut sigchld = signal(SignalKind::child())?;
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = sigchld.recv() => {}
                _ = tick.tick() => {}
            }

            match poll_child(pid) {
                Ok(Some(outcome)) => {
                    tracing::info!(pid = pid, outcome = ?outcome, "Shell terminated");
                    let _ = tx.send(Some(outcome));
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(pid = pid, error = %e, "waitpid failed, treating shell as gone");
                    let _ = tx.send(Some(ExitOutcome::Exited(1)));
                    break;
                }
            }
        }
    });

    Ok(rx)
}

/// Polls the child once without blocking.
///
/// Returns `Ok(None)` while the child is still running (including when
/// it is stopped or just continued).
fn poll_child(pid: u32) -> nix::Result<Option<ExitOutcome>> {
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;

    loop {
        match waitpid(Pid::from_raw(pid as i32), Some(flags)) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(Some(ExitOutcome::Exited(code))),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(Some(ExitOutcome::Signaled(sig as i32)))
            }
            Ok(WaitStatus::Stopped(_, sig)) => {
                tracing::debug!(pid = pid, signal = ?sig, "Shell stopped");
                return Ok(None);
            }
            Ok(WaitStatus::Continued(_)) => {
                tracing::debug!(pid = pid, "Shell continued");
                return Ok(None);
            }
            Ok(WaitStatus::StillAlive) => return Ok(None),
            Ok(_) => return Ok(None),
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}
