//! Shell session management.
//!
//! A session is a shell process attached to a pseudo-terminal. This
//! module spawns the shell, pumps its output into a channel, and
//! classifies how the child eventually terminated.

pub mod pty;
pub mod reaper;

pub use pty::{SessionError, TerminalSession};
pub use reaper::watch_child;

/// How the shell child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The shell exited normally with this exit code.
    Exited(i32),

    /// The shell was killed by this signal number.
    Signaled(i32),
}

impl ExitOutcome {
    /// Maps the outcome to a process exit code.
    ///
    /// A signal death becomes exit code 1; the operator sees the signal
    /// itself through a diagnostic printed separately.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitOutcome::Exited(code) => *code,
            ExitOutcome::Signaled(_) => 1,
        }
    }
}
